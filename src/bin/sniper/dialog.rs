//! Interactive strategy setup on the console.

use launch_sniper::{
    setup::{SetupDraft, SetupStep, Transition},
    types::SniperConfig,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::error::{Error, Result};

/// Asks for every strategy field on stdin until the setup is confirmed.
pub async fn collect_config() -> Result<SniperConfig> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut draft = SetupDraft::default();
    let mut step = SetupStep::FIRST;

    stdout
        .write_all(b"Let's create a new sniping setup.\n")
        .await?;
    let mut prompt = step.prompt().to_string();
    loop {
        if step == SetupStep::Confirm {
            stdout
                .write_all(format!("{}\n", draft.summary()).as_bytes())
                .await?;
        }
        stdout.write_all(format!("{prompt}\n").as_bytes()).await?;
        stdout.flush().await?;

        let Some(input) = lines.next_line().await? else {
            return Err(Error::SetupCancelled);
        };
        match draft.apply(step, &input) {
            Ok(Transition::Next(next)) => {
                step = next;
                prompt = step.prompt().to_string();
            }
            Ok(Transition::Complete(config)) => return Ok(config),
            Ok(Transition::Cancelled) => return Err(Error::SetupCancelled),
            Err(err) => prompt = err.to_string(),
        }
    }
}
