use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Default)]
struct ConfigSection {
    page_size: Option<usize>,
    cacheline_size: Option<usize>,
    num_class: Option<usize>,
    base_class: Option<usize>,
    heap_capacity: Option<usize>,
}

#[derive(Deserialize, Default)]
struct Config {
    #[serde(default)]
    config: ConfigSection,
}

struct ResolvedConfig {
    page_size: usize,
    page_shift: u32,
    cacheline_size: usize,
    num_class: usize,
    base_class: usize,
    heap_capacity: usize,
}

fn resolve_config(cfg: &ConfigSection) -> ResolvedConfig {
    let page_size = cfg.page_size.unwrap_or(4096);
    assert!(
        page_size >= 4096 && page_size.is_power_of_two(),
        "page_size ({}) must be a power of 2 and >= 4096",
        page_size
    );

    let cacheline_size = cfg.cacheline_size.unwrap_or(64);
    assert!(
        cacheline_size.is_power_of_two() && cacheline_size >= 32,
        "cacheline_size ({}) must be a power of 2 and >= 32",
        cacheline_size
    );
    assert!(
        cacheline_size < page_size,
        "cacheline_size ({}) must be < page_size ({})",
        cacheline_size,
        page_size
    );

    let num_class = cfg.num_class.unwrap_or(9);
    let base_class = cfg.base_class.unwrap_or(3);
    assert!(num_class >= 1, "num_class must be >= 1");
    assert!(
        (1usize << base_class) >= 8,
        "base_class ({}) must give blocks of at least 8 bytes (free-list link width)",
        base_class
    );
    // The largest class must still go through the sub-page path, which caps
    // requests at half a page.
    let largest = 1usize << (base_class + num_class - 1);
    assert!(
        largest <= page_size / 2,
        "largest block class ({}) must be <= page_size/2 ({})",
        largest,
        page_size / 2
    );

    let heap_capacity = cfg.heap_capacity.unwrap_or(1 << 30);
    assert!(
        heap_capacity >= 64 * page_size && heap_capacity % page_size == 0,
        "heap_capacity ({}) must be a multiple of page_size and hold at least 64 pages",
        heap_capacity
    );

    ResolvedConfig {
        page_size,
        page_shift: page_size.trailing_zeros(),
        cacheline_size,
        num_class,
        base_class,
        heap_capacity,
    }
}

fn default_config_path() -> String {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    format!("{}/pcmalloc.toml", manifest_dir)
}

fn generate_config(cfg: &ResolvedConfig, out_path: &Path) {
    let code = format!(
        "// Auto-generated by build.rs. Do not edit.\n\n\
         pub const PAGE_SHIFT: usize = {};\n\
         pub const PAGE_SIZE: usize = {};\n\
         pub const CACHELINE_SIZE: usize = {};\n\
         pub const NUM_CLASS: usize = {};\n\
         pub const BASE_CLASS: usize = {};\n\
         pub const HEAP_CAPACITY: usize = {};\n",
        cfg.page_shift,
        cfg.page_size,
        cfg.cacheline_size,
        cfg.num_class,
        cfg.base_class,
        cfg.heap_capacity,
    );
    fs::write(out_path, code).expect("failed to write config_gen.rs");
}

fn main() {
    println!("cargo:rerun-if-env-changed=PCMALLOC_CONFIG");

    let out_dir = env::var("OUT_DIR").unwrap();

    let config_path = env::var("PCMALLOC_CONFIG").unwrap_or_else(|_| default_config_path());
    println!("cargo:rerun-if-changed={}", config_path);
    let content = fs::read_to_string(&config_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", config_path, e));

    let config: Config = toml::from_str(&content).expect("failed to parse TOML config");
    let resolved = resolve_config(&config.config);

    generate_config(&resolved, &Path::new(&out_dir).join("config_gen.rs"));
}
