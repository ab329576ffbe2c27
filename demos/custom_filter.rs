//! Example demonstrating custom filter policies
//!
//! This example plugs a Rust handler into the native policy layer and
//! compares it with the built-in Bloom policy.
//!
//! Run with `RUST_LOG=debug cargo run --example custom_filter` to see the
//! registry and bridge logging.

use filterbridge::{FilterPolicy, FilterPolicyHandler, Options, Result};

/// Filter that remembers the first two bytes of every key.
///
/// Useful when keys share a short prefix per table, e.g. `"u:"` for users.
struct PrefixFilter;

impl FilterPolicyHandler for PrefixFilter {
    fn create_filter(&self, keys: &[Vec<u8>]) -> Vec<u8> {
        let mut prefixes: Vec<[u8; 2]> = keys
            .iter()
            .map(|k| [k.first().copied().unwrap_or(0), k.get(1).copied().unwrap_or(0)])
            .collect();
        prefixes.sort_unstable();
        prefixes.dedup();
        prefixes.concat()
    }

    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        let prefix = [key.first().copied().unwrap_or(0), key.get(1).copied().unwrap_or(0)];
        filter.chunks_exact(2).any(|p| p == prefix)
    }

    fn name(&self) -> &str {
        "demo.PrefixFilter"
    }
}

fn main() -> Result<()> {
    env_logger::init();
    println!("=== Custom Filter Policy Example ===\n");

    let keys: Vec<&[u8]> = ["u:1001", "u:1002", "u:1003", "o:9001"]
        .iter()
        .map(|&k| k.as_bytes())
        .collect();

    // Example 1: Custom policy through the callback bridge
    example_custom_policy(&keys)?;

    // Example 2: Built-in Bloom policy from options
    example_bloom_policy(&keys)?;

    Ok(())
}

fn example_custom_policy(keys: &[&[u8]]) -> Result<()> {
    println!("--- Example 1: Custom Policy ---");

    let mut policy = FilterPolicy::new_custom(PrefixFilter);
    println!(
        "Registered '{}' as handler {:?}",
        policy.name()?,
        policy.registry_id()
    );

    let filter = policy.create_filter(keys)?;
    println!("Filter: {} bytes", filter.len());

    for probe in ["u:7777", "o:1", "x:1"].map(str::as_bytes) {
        println!(
            "  {} may match? {}",
            String::from_utf8_lossy(probe),
            policy.key_may_match(probe, &filter)?
        );
    }

    // The engine is "closed" here, so releasing the policy is safe.
    policy.destroy();
    println!();
    Ok(())
}

fn example_bloom_policy(keys: &[&[u8]]) -> Result<()> {
    println!("--- Example 2: Built-in Bloom Policy ---");

    let options = Options::from_json(r#"{ "bits_per_key": 10 }"#)?;
    let policy = match options.bloom_policy()? {
        Some(policy) => policy,
        None => return Ok(()),
    };
    println!("Policy name: {}", policy.name()?);

    let filter = policy.create_filter(keys)?;
    println!("Filter: {} bytes for {} keys", filter.len(), keys.len());

    for key in keys {
        println!(
            "  {} may match? {}",
            String::from_utf8_lossy(key),
            policy.key_may_match(key, &filter)?
        );
    }
    println!(
        "  u:9999 may match? {} (should usually be false)",
        policy.key_may_match(b"u:9999", &filter)?
    );

    Ok(())
}
