use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cache::CacheInfo;
use crate::cli::Invocation;
use crate::git::StatusSnapshot;

#[derive(Args)]
pub struct CacheArgs {
    /// Bypass the cached snapshot
    #[arg(long)]
    pub force: bool,

    /// Query the status this many times to exercise the cache
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,
}

#[derive(Serialize)]
struct CacheReport {
    snapshot: StatusSnapshot,
    caches: Vec<CacheInfo>,
}

pub async fn execute(args: CacheArgs, invocation: &Invocation) -> Result<i32> {
    let output = &invocation.output;
    let hookgate = super::open(invocation)?;
    let cache = hookgate.caches.get_default(&hookgate.repo_root)?;

    let mut snapshot = cache.get_status(args.force).await;
    for _ in 1..args.repeat {
        snapshot = cache.get_status(false).await;
    }

    let report = CacheReport {
        snapshot,
        caches: hookgate.caches.snapshot_all_cache_info(),
    };
    if output.emit(&report)? {
        return Ok(0);
    }

    for info in &report.caches {
        output.header(&format!("{}", info.repo_path.display()));
        output.field("ttl", format!("{}s", info.ttl_secs));
        output.field("valid", info.is_valid);
        if let Some(age) = info.age_secs {
            output.field("age", format!("{age:.3}s"));
        }
        output.field("circuit", info.circuit.state);
        output.field("fallback available", info.has_fallback);
        output.field("requests", info.metrics.total_requests);
        output.field("hits", info.metrics.cache_hits);
        output.field("misses", info.metrics.cache_misses);
        output.field("fallback uses", info.metrics.fallback_uses);
        output.field("avg response", format!("{:.2}ms", info.metrics.avg_response_time_ms));
    }

    if report.snapshot.is_fallback {
        output.warning(&format!(
            "serving fallback snapshot captured at {}",
            report.snapshot.captured_at
        ));
    }
    Ok(0)
}
