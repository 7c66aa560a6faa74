//! Dispatches a parsed command line into the pull/push pipelines

use std::time::Instant;

use crate::cli::args::{Args, Command, CommonArgs};
use crate::config::ServiceRequest;
use crate::error::Result;
use crate::output::OutputManager;
use crate::registry::{copy_to_disk, push_to_registry};

pub struct Runner {
    args: Args,
    output: OutputManager,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        let output = OutputManager::new(args.verbose);
        Self { args, output }
    }

    pub async fn run(&self) -> Result<()> {
        let start_time = Instant::now();

        let result = match &self.args.command {
            Command::Copy { common } => {
                let request = build_request(common)?;
                self.output.section(&format!(
                    "copy {} -> {}",
                    request.ref_name(),
                    request.path
                ));
                copy_to_disk(&request, &self.output).await
            }
            Command::Push { common } => {
                let request = build_request(common)?;
                self.output.section(&format!(
                    "push {} -> {}",
                    request.path,
                    request.ref_name()
                ));
                push_to_registry(&request, &self.output).await
            }
        };

        if result.is_ok() {
            self.output.info(&format!(
                "completed in {}",
                self.output
                    .format_duration(start_time.elapsed())
            ));
        }
        result
    }

    pub fn output(&self) -> &OutputManager {
        &self.output
    }
}

fn build_request(common: &CommonArgs) -> Result<ServiceRequest> {
    Ok(ServiceRequest::new(&common.image, &common.tag, &common.path)?
        .with_tls(common.tls)
        .with_basic_auth(common.basic_auth)
        .with_concurrency(common.concurrency)
        .with_timeout(common.timeout))
}
