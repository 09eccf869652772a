use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Default)]
struct ConfigSection {
    block_size: Option<usize>,
    block_count: Option<usize>,
    cache_limit: Option<u32>,
    refill_limit: Option<u32>,
}

#[derive(Deserialize, Default)]
struct Config {
    #[serde(default)]
    config: ConfigSection,
}

struct ResolvedConfig {
    block_size: usize,
    block_count: usize,
    cache_limit: u32,
    refill_limit: u32,
}

fn resolve_config(cfg: &ConfigSection) -> ResolvedConfig {
    let block_size = cfg.block_size.unwrap_or(64);
    assert!(
        block_size.is_power_of_two(),
        "block_size ({}) must be a power of 2",
        block_size
    );
    assert!(
        block_size >= 8 && block_size % 8 == 0,
        "block_size ({}) must be >= 8 and 8-byte aligned",
        block_size
    );

    let block_count = cfg.block_count.unwrap_or(1024);
    assert!(
        block_count.is_power_of_two(),
        "block_count ({}) must be a power of 2",
        block_count
    );
    assert!(block_count >= 4, "block_count ({}) must be >= 4", block_count);

    let cache_limit = cfg.cache_limit.unwrap_or(64);
    let refill_limit = cfg.refill_limit.unwrap_or(32);
    assert!(cache_limit > 0, "cache_limit must be > 0");
    assert!(refill_limit > 0, "refill_limit must be > 0");
    assert!(
        refill_limit <= cache_limit,
        "refill_limit ({}) must be <= cache_limit ({})",
        refill_limit,
        cache_limit
    );
    assert!(
        (refill_limit as usize) < block_count,
        "refill_limit ({}) must be < block_count ({})",
        refill_limit,
        block_count
    );

    ResolvedConfig {
        block_size,
        block_count,
        cache_limit,
        refill_limit,
    }
}

fn default_config_path() -> String {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    format!("{}/fbmalloc.toml", manifest_dir)
}

fn generate_config(cfg: &ResolvedConfig, out_path: &Path) {
    let code = format!(
        "// Auto-generated by build.rs. Do not edit.\n\n\
         pub const BLOCK_SIZE: usize = {};\n\
         pub const BLOCK_COUNT: usize = {};\n\
         pub const BLOCK_CACHE_LIMIT: u32 = {};\n\
         pub const BLOCK_CACHE_REFILL_LIMIT: u32 = {};\n",
        cfg.block_size, cfg.block_count, cfg.cache_limit, cfg.refill_limit,
    );
    fs::write(out_path, code).expect("failed to write config_gen.rs");
}

fn main() {
    println!("cargo:rerun-if-env-changed=FBMALLOC_CONFIG");

    let out_dir = env::var("OUT_DIR").unwrap();

    let config_path = env::var("FBMALLOC_CONFIG").unwrap_or_else(|_| default_config_path());
    println!("cargo:rerun-if-changed={}", config_path);
    let content = fs::read_to_string(&config_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", config_path, e));

    let config: Config = toml::from_str(&content).expect("failed to parse TOML config");

    let resolved = resolve_config(&config.config);
    generate_config(&resolved, &Path::new(&out_dir).join("config_gen.rs"));
}
