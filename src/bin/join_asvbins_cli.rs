use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use join_asvbins::config::{CandidateConfig, MatchConfig};
use join_asvbins::filter::FilterCriteria;
use join_asvbins::{find_asv_matches, find_candidates, CandidateInputs, MatchInputs, StageResults};

#[derive(Parser)]
#[command(name = "join-asvbins")]
#[command(version)]
#[command(about = "Reconcile 16S hits in bins and match ASVs to them")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Combine BLAST/MMseqs2 and Barrnap 16S hits in bin scaffolds
    Candidates {
        /// Alignment statistics of generic 16S against the bins (14 columns)
        #[arg(long)]
        stats: PathBuf,
        /// Bin scaffolds FASTA
        #[arg(long)]
        scaffolds: PathBuf,
        /// Barrnap FASTA with target:start-end headers
        #[arg(long)]
        barrnap_fasta: PathBuf,
        /// Barrnap GFF
        #[arg(long)]
        barrnap_gff: PathBuf,
        /// rRNA marker to keep from the GFF
        #[arg(long, default_value = "16S")]
        marker: String,
        /// Minimum alignment length for hits reaching a scaffold end
        #[arg(long, requires = "min_length_pct_no_overlap")]
        min_length_with_overlap: Option<u64>,
        /// Minimum percent identity for hits that do not reach a scaffold end
        #[arg(long, requires = "min_length_with_overlap")]
        min_length_pct_no_overlap: Option<f64>,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Keep the candidate 16S sequences that ASVs match
    Matches {
        /// Alignment statistics of ASVs against the candidates (14 columns)
        #[arg(long)]
        stats: PathBuf,
        /// Candidate 16S FASTA from the candidates step
        #[arg(long)]
        candidates: PathBuf,
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Output FASTA
    #[arg(long)]
    out_fasta: PathBuf,
    /// Output statistics TSV
    #[arg(long)]
    out_stats: PathBuf,
    /// The statistics came from BLAST instead of MMseqs2
    #[arg(long)]
    blast: bool,
    /// Continue when one search found nothing
    #[arg(long)]
    allow_empty: bool,
    /// Remove every filter threshold
    #[arg(long)]
    no_filter: bool,
    #[arg(long)]
    min_pct_id: Option<f64>,
    #[arg(long)]
    min_length: Option<u64>,
    #[arg(long)]
    min_length_pct: Option<f64>,
    #[arg(long)]
    max_gaps: Option<u64>,
    #[arg(long)]
    max_mismatch: Option<u64>,
}

impl CommonArgs {
    fn search_tool(&self) -> String {
        let name = if self.blast { "blast" } else { "mmseqs" };
        name.to_string()
    }

    fn apply(&self, criteria: &mut FilterCriteria) {
        if let Some(v) = self.min_pct_id {
            criteria.min_percent_identity = Some(v);
        }
        if let Some(v) = self.min_length {
            criteria.min_alignment_length = Some(v);
        }
        if let Some(v) = self.min_length_pct {
            criteria.min_length_percent = Some(v);
        }
        if let Some(v) = self.max_gaps {
            criteria.max_gap_openings = Some(v);
        }
        if let Some(v) = self.max_mismatch {
            criteria.max_mismatches = Some(v);
        }
    }
}

fn spinner(color: &str, msg: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let template = format!("{{spinner:.{color}}} {{msg}}");
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template(&template)
    {
        spinner.set_style(style);
    }
    spinner.set_message(msg.to_string());
    spinner
}

fn run(cli: Cli) -> join_asvbins::error::Result<()> {
    let (results, common): (StageResults, CommonArgs) = match cli.command {
        Command::Candidates {
            stats,
            scaffolds,
            barrnap_fasta,
            barrnap_gff,
            marker,
            min_length_with_overlap,
            min_length_pct_no_overlap,
            common,
        } => {
            let mut config = CandidateConfig {
                search_tool: common.search_tool(),
                allow_empty: common.allow_empty,
                marker,
                ..CandidateConfig::default()
            };
            if common.no_filter {
                config = config.without_filters();
            } else {
                common.apply(&mut config.criteria);
                if let (Some(len), Some(pct)) = (min_length_with_overlap, min_length_pct_no_overlap) {
                    config.criteria = config.criteria.with_end_overlap(len, pct);
                }
            }
            let inputs = CandidateInputs {
                alignment_stats: stats,
                scaffolds,
                gene_finder_fasta: barrnap_fasta,
                gene_finder_gff: barrnap_gff,
            };

            let sp = spinner("green", "Combining 16S candidates...");
            let results = find_candidates(&inputs, &config);
            sp.finish_with_message("Candidate search finished.");
            (results?, common)
        }
        Command::Matches { stats, candidates, common } => {
            let mut config = MatchConfig {
                search_tool: common.search_tool(),
                allow_empty: common.allow_empty,
                ..MatchConfig::default()
            };
            if common.no_filter {
                config = config.without_filters();
            } else {
                common.apply(&mut config.criteria);
            }
            let inputs = MatchInputs {
                alignment_stats: stats,
                candidates,
            };

            let sp = spinner("green", "Matching ASVs to candidate 16S...");
            let results = find_asv_matches(&inputs, &config);
            sp.finish_with_message("ASV matching finished.");
            (results?, common)
        }
    };

    let sp = spinner("yellow", "Writing output files...");
    results.write_outputs(&common.out_fasta, &common.out_stats)?;
    sp.finish_with_message(format!(
        "Wrote {} sequences to {}",
        results.hits.len(),
        common.out_fasta.display()
    ));
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
