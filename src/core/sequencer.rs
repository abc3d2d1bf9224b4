//! Install orchestration
//!
//! Runs an [`InstallPlan`] one entry at a time, in plan order. The first
//! failure stops the run; nothing is retried or rolled back.

use serde::Serialize;

use crate::core::context::{InstallContext, InstallStep};
use crate::core::descriptor::{DescriptorRegistry, InstalledLocation, PackageDescriptor};
use crate::core::plan::InstallPlan;
use crate::error::SequencerError;
use crate::infra::process::ToolRunner;

/// What happened to one plan entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageOutcome {
    /// The descriptor installed it in this run
    Installed,
    /// The descriptor's probe found an existing install
    AlreadyPresent,
}

/// Progress notification for observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerEvent<'a> {
    /// About to install `package` (1-based `index` of `total`)
    Starting {
        package: &'a str,
        index: usize,
        total: usize,
    },
    /// `package` was already present
    Skipped { location: &'a InstalledLocation },
    /// `package` installed
    Finished { location: &'a InstalledLocation },
}

/// One finished plan entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub location: InstalledLocation,
    pub outcome: PackageOutcome,
}

/// Result of a successful run, in plan order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub entries: Vec<ReportEntry>,
}

impl InstallReport {
    /// Number of packages installed in this run
    pub fn installed_count(&self) -> usize {
        self.count(PackageOutcome::Installed)
    }

    /// Number of packages found already present
    pub fn present_count(&self) -> usize {
        self.count(PackageOutcome::AlreadyPresent)
    }

    /// Location of `name`, if it is part of the report
    pub fn location(&self, name: &str) -> Option<&InstalledLocation> {
        self.entries
            .iter()
            .find(|e| e.location.name == name)
            .map(|e| &e.location)
    }

    fn count(&self, outcome: PackageOutcome) -> usize {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }
}

/// Drives descriptors through a plan
pub struct Sequencer<'a> {
    registry: &'a DescriptorRegistry,
    tools: &'a dyn ToolRunner,
}

impl<'a> Sequencer<'a> {
    pub fn new(registry: &'a DescriptorRegistry, tools: &'a dyn ToolRunner) -> Self {
        Self { registry, tools }
    }

    /// Install every plan entry in order
    pub fn execute(
        &self,
        plan: &InstallPlan,
        ctx: &InstallContext,
    ) -> Result<InstallReport, SequencerError> {
        self.execute_observed(plan, ctx, |_| {})
    }

    /// [`Sequencer::execute`], reporting progress to `observer`
    pub fn execute_observed<F>(
        &self,
        plan: &InstallPlan,
        ctx: &InstallContext,
        mut observer: F,
    ) -> Result<InstallReport, SequencerError>
    where
        F: FnMut(SequencerEvent<'_>),
    {
        let descriptors = self.resolve(plan)?;
        let total = descriptors.len();

        let mut installed: Vec<InstalledLocation> = Vec::with_capacity(total);
        let mut report = InstallReport::default();

        for (index, (request, descriptor)) in plan.entries().iter().zip(descriptors).enumerate() {
            observer(SequencerEvent::Starting {
                package: &request.name,
                index: index + 1,
                total,
            });

            let (location, outcome) = {
                let mut step = InstallStep::new(ctx, request, &installed, self.tools);

                if let Some(location) = descriptor.probe(&step) {
                    tracing::info!("{} already present at {}", request.name, location.prefix.display());
                    (location, PackageOutcome::AlreadyPresent)
                } else {
                    tracing::info!("Installing {}", request.spec());
                    let location = descriptor.install(&mut step).map_err(|source| {
                        tracing::error!("{} failed: {source}", request.name);
                        SequencerError::PackageFailed {
                            package: request.name.clone(),
                            source,
                        }
                    })?;
                    (location, PackageOutcome::Installed)
                }
            };

            match outcome {
                PackageOutcome::AlreadyPresent => observer(SequencerEvent::Skipped { location: &location }),
                PackageOutcome::Installed => observer(SequencerEvent::Finished { location: &location }),
            }

            installed.push(location.clone());
            report.entries.push(ReportEntry { location, outcome });
        }

        Ok(report)
    }

    /// Fail with [`SequencerError::MissingDescriptor`] unless every entry can be installed
    pub fn check(&self, plan: &InstallPlan) -> Result<(), SequencerError> {
        self.resolve(plan).map(|_| ())
    }

    fn resolve(&self, plan: &InstallPlan) -> Result<Vec<&'a dyn PackageDescriptor>, SequencerError> {
        plan.entries()
            .iter()
            .map(|request| {
                self.registry
                    .get(&request.name)
                    .ok_or_else(|| SequencerError::MissingDescriptor {
                        package: request.name.clone(),
                    })
            })
            .collect()
    }
}
