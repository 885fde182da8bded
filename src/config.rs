use serde::{Deserialize, Serialize};

/// Maximum allowed length for search queries (characters).
pub const MAX_SEARCH_QUERY_LENGTH: usize = 1000;

/// Canonical list of file extensions parsed as plain text/source
/// (read as UTF-8, replacing decoding errors, no further transformation).
pub const TEXT_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs",
    "rs", "py", "go", "java", "c", "cpp", "h", "hpp",
    "cs", "rb", "php", "swift", "kt", "scala",
    "html", "css", "scss", "less", "sass",
    "json", "yaml", "yml", "toml", "xml",
    "md", "mdx", "txt", "rst",
    "sql", "graphql", "gql",
    "sh", "bash", "zsh", "fish", "ps1", "bat", "cmd",
    "dockerfile", "makefile",
    "vue", "svelte", "astro",
    "lua", "zig", "nim", "dart", "elixir", "ex", "exs",
    "r", "jl", "clj", "cljs", "cljc", "erl", "hrl",
    "tf", "hcl", "proto",
    "env", "ini", "cfg", "conf", "csv", "tsv", "log",
];

pub const DOCX_EXTENSIONS: &[&str] = &["docx"];
pub const PDF_EXTENSIONS: &[&str] = &["pdf"];
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tif", "tiff"];

/// Detected parser family for a lower-cased extension, or `None` if unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFamily {
    Text,
    Docx,
    Pdf,
    Image,
}

pub fn classify_extension(ext: &str) -> Option<FileFamily> {
    let ext = ext.to_lowercase();
    if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        Some(FileFamily::Text)
    } else if DOCX_EXTENSIONS.contains(&ext.as_str()) {
        Some(FileFamily::Docx)
    } else if PDF_EXTENSIONS.contains(&ext.as_str()) {
        Some(FileFamily::Pdf)
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(FileFamily::Image)
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub listen_addr: String,
    pub data_dir: String,

    pub model_id: String,
    pub embedding_dim: usize,

    pub chunk_size: usize,
    pub chunk_overlap: usize,

    pub max_top_k: usize,

    pub embedding_cache_mb: usize,
    pub embedding_cache_ttl_s: u64,
    pub search_cache_mb: usize,
    pub search_cache_ttl_s: u64,

    pub worker_pool_size: usize,
    pub max_file_size_bytes: usize,

    pub vector_store_url: String,
    pub collection_name: String,

    pub debounce_ms: u64,
    pub max_watch_depth: usize,

    pub ocr_psm: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT").unwrap_or_else(|_| "8099".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|d| d.join("lucidfiles-worker").to_string_lossy().to_string())
                .unwrap_or_else(|| ".lucidfiles-data".to_string())
        });

        Self {
            listen_addr: format!("127.0.0.1:{}", port),
            data_dir,
            model_id: std::env::var("MODEL_ID")
                .unwrap_or_else(|_| "Qwen/Qwen3-Embedding-0.6B".to_string()),
            embedding_dim: env_usize("EMBEDDING_DIM", 1024),
            chunk_size: env_usize("CHUNK_SIZE", 800),
            chunk_overlap: env_usize("CHUNK_OVERLAP", 120),
            max_top_k: env_usize("MAX_TOP_K", 100),
            embedding_cache_mb: env_usize("EMBEDDING_CACHE_MB", 512),
            embedding_cache_ttl_s: env_u64("EMBEDDING_CACHE_TTL_S", 3600),
            search_cache_mb: env_usize("SEARCH_CACHE_MB", 128),
            search_cache_ttl_s: env_u64("SEARCH_CACHE_TTL_S", 1800),
            worker_pool_size: env_usize("WORKER_POOL_SIZE", num_cpus()),
            max_file_size_bytes: env_usize("MAX_FILE_SIZE_BYTES", 25 * 1024 * 1024),
            vector_store_url: std::env::var("VECTOR_STORE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:6334".to_string()),
            collection_name: std::env::var("COLLECTION_NAME")
                .unwrap_or_else(|_| "lucidfiles".to_string()),
            debounce_ms: env_u64("DEBOUNCE_MS", 400),
            max_watch_depth: env_usize("MAX_WATCH_DEPTH", 64),
            ocr_psm: env_u32("OCR_PSM", 3),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn num_cpus() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

/// Directory names skipped by every tree walk.
pub fn is_excluded_directory(name: &str) -> bool {
    const EXCLUDED: &[&str] = &[
        "node_modules", ".git", "target", "dist", "build", "out",
        ".next", ".nuxt", ".cache", "vendor", ".gradle", ".terraform",
        ".vscode", ".idea", "__pycache__", ".venv", "venv",
    ];
    EXCLUDED.contains(&name) || name.ends_with(".egg-info")
}
