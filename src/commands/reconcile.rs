//! Reconcile command implementation
//!
//! Diffs the ledger's base release against the target release, replays every
//! live extension, renders the report and commits the new ledger. With
//! `--dry-run` nothing is committed; requested files are still written.

use std::path::PathBuf;

use console::Style;

use super::helpers;
use crate::artifact::ArtifactVersion;
use crate::cli::ReconcileArgs;
use crate::config::OverlayConfig;
use crate::diff::{self, Delta};
use crate::error::{OverlayError, Result, config as config_error};
use crate::ledger::OverlayLedger;
use crate::reconcile::{self, MergeMode, ReconcileOptions, Reconciliation};
use crate::report::{self, Report, narrative};
use crate::workspace::Output;

/// One reconciliation, computed but not committed
struct Plan {
    reconciliation: Reconciliation,
    report: Report,
}

/// Run reconcile command
pub fn run(workspace: Option<PathBuf>, args: ReconcileArgs) -> Result<()> {
    let workspace = helpers::open_workspace(workspace)?;
    let options = reconcile_options(&workspace.config, args.move_threshold)?;
    let ledger = workspace.load_ledger()?;
    let base_tag = ledger.base_tag.clone().ok_or_else(|| {
        config_error::invalid("the ledger has no base tag; run 'overlay init <tag>' first")
    })?;

    let store = workspace.store()?;
    let (old, new) = helpers::fetch_pair(&store, &base_tag, &args.tag, !args.json)?;
    let plan = plan(&ledger, &old, &new, &workspace.config, &options)?;
    let outputs = outputs(&args, &plan)?;

    if args.json {
        print!("{}", plan.report.to_json()?);
    } else {
        print!("{}", narrative::report(&plan.report));
    }

    let verdict = plan.reconciliation.require_total();
    if args.dry_run {
        workspace.write_outputs(&outputs)?;
        if !args.json {
            println!("{}", Style::new().dim().apply_to("Dry run: ledger not committed"));
        }
        return verdict;
    }

    let mode = if args.require_total {
        MergeMode::Total
    } else {
        MergeMode::Partial
    };
    match plan.reconciliation.accept(mode) {
        Ok(accepted) => {
            let committed =
                workspace.commit_ledger(accepted.basis_revision, accepted.ledger, &outputs)?;
            if !args.json {
                println!(
                    "Ledger committed at revision {} (base {})",
                    committed.revision,
                    Style::new().bold().apply_to(&args.tag)
                );
            }
            verdict
        }
        Err(err) => {
            workspace.write_outputs(&outputs)?;
            if !args.json {
                println!(
                    "{}",
                    Style::new()
                        .dim()
                        .apply_to("--require-total: ledger not committed")
                );
            }
            Err(err)
        }
    }
}

/// Configured reconciler options, with an optional threshold override
fn reconcile_options(config: &OverlayConfig, threshold: Option<f64>) -> Result<ReconcileOptions> {
    let mut options = config.reconcile_options();
    if let Some(threshold) = threshold {
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(config_error::invalid(format!(
                "--move-threshold must be in (0, 1], got {threshold}"
            )));
        }
        options.move_threshold = threshold;
    }
    Ok(options)
}

fn plan(
    ledger: &OverlayLedger,
    old: &ArtifactVersion,
    new: &ArtifactVersion,
    config: &OverlayConfig,
    options: &ReconcileOptions,
) -> Result<Plan> {
    let delta: Delta = diff::diff(old, new, &config.diff_options());
    let reconciliation = reconcile::reconcile(ledger, &delta, new, options)?;
    let report = report::render(&reconciliation.ledger, &reconciliation, &delta);
    Ok(Plan {
        reconciliation,
        report,
    })
}

/// Files requested on the command line
fn outputs(args: &ReconcileArgs, plan: &Plan) -> Result<Vec<Output>> {
    let mut outputs = Vec::new();
    if let Some(path) = &args.report {
        outputs.push(Output {
            path: path.clone(),
            contents: plan.report.to_json()?,
        });
    }
    if let Some(path) = &args.merged {
        let contents = serde_yaml::to_string(&plan.reconciliation.merged).map_err(|e| {
            OverlayError::IoError {
                message: format!("Failed to serialize merged schema: {e}"),
            }
        })?;
        outputs.push(Output {
            path: path.clone(),
            contents,
        });
    }
    Ok(outputs)
}
