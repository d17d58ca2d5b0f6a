use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::io;
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::config::WalletConfig;
use crate::error::FaucetError;
use crate::models::{Address, TransactionId};

lazy_static! {
    static ref TXHASH: Regex = Regex::new(r"(?i)txhash:\s*([A-F0-9]+)").unwrap();
}

// What the wallet process left behind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Performs the actual transfer to a validated address.
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn send(&self, recipient: &Address) -> io::Result<WalletOutput>;
}

/// Shells out to `<binary> tx bank send <sender> <recipient> <amount> --yes`
/// with the chain settings exported into the child's environment.
pub struct CliWallet {
    config: WalletConfig,
}

impl CliWallet {
    pub fn new(config: WalletConfig) -> Self {
        Self { config }
    }

    // each value is its own argv entry, nothing goes through a shell
    pub fn command(&self, recipient: &Address) -> Command {
        let mut cmd = Command::new(&self.config.binary);
        cmd.args(["tx", "bank", "send"])
            .arg(&self.config.sender)
            .arg(recipient.as_str())
            .arg(&self.config.amount)
            .arg("--yes")
            .envs(self.config.chain.vars())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl Wallet for CliWallet {
    async fn send(&self, recipient: &Address) -> io::Result<WalletOutput> {
        let mut cmd = self.command(recipient);
        debug!(binary = %self.config.binary, recipient = %recipient, "Spawning wallet command");

        let mut child = cmd.spawn()?;

        let (status, stdout, stderr) = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, wait_for_output(&mut child)).await {
                Ok(finished) => finished?,
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "Failed to kill timed out wallet command");
                    }
                    return Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("wallet command timed out after {}s", limit.as_secs()),
                    ));
                }
            },
            None => wait_for_output(&mut child).await?,
        };

        Ok(WalletOutput {
            success: status.success(),
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

// Like `Child::wait_with_output`, but borrows the child so it can still be
// killed when the caller gives up waiting.
async fn wait_for_output(child: &mut Child) -> io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok(buf)
    }

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (status, stdout, stderr) = tokio::try_join!(child.wait(), drain(stdout), drain(stderr))?;
    Ok((status, stdout, stderr))
}

/// First `txhash: <hex>` in the wallet's stdout.
pub fn parse_tx_hash(stdout: &str) -> TransactionId {
    TXHASH
        .captures(stdout)
        .and_then(|caps| caps.get(1))
        .map(|m| TransactionId::Hash(m.as_str().to_string()))
        .unwrap_or(TransactionId::Unknown)
}

pub fn truncate_detail(detail: &str, limit: usize) -> String {
    detail.chars().take(limit).collect()
}

/// Turn a wallet run into a transaction id or a `TransactionFailed`.
///
/// A run fails when the process could not be run, exited unsuccessfully,
/// or wrote to stderr without writing anything to stdout. A successful run
/// without a recognizable hash still succeeds with `TransactionId::Unknown`.
pub fn settle(run: io::Result<WalletOutput>, detail_limit: usize) -> Result<TransactionId, FaucetError> {
    let output = run.map_err(|e| FaucetError::TransactionFailed(truncate_detail(&e.to_string(), detail_limit)))?;

    let stdout = output.stdout.trim();
    let stderr = output.stderr.trim();

    if !output.success {
        let detail = if !stderr.is_empty() {
            stderr.to_string()
        } else if !stdout.is_empty() {
            stdout.to_string()
        } else {
            match output.code {
                Some(code) => format!("wallet command exited with code {}", code),
                None => "wallet command terminated by signal".to_string(),
            }
        };
        return Err(FaucetError::TransactionFailed(truncate_detail(&detail, detail_limit)));
    }

    if stdout.is_empty() && !stderr.is_empty() {
        return Err(FaucetError::TransactionFailed(truncate_detail(stderr, detail_limit)));
    }

    Ok(parse_tx_hash(&output.stdout))
}
