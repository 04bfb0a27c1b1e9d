pub mod collection;
pub mod config;
pub mod id;
pub mod indexer;
pub mod parser;
pub mod search;
pub mod srs;
pub mod tool;

// 重新导出 parser 模块中的公共 API
pub use parser::{
    frontmatter::{has_frontmatter, parse_frontmatter, split_frontmatter},
    link::{dedup_links, extract_headings, extract_links},
    parse_markdown, Frontmatter, Heading, Link, LinkKind, LinkRelation, ParsedDoc,
};

// 重新导出 indexer 模块中的公共 API
pub use indexer::{build_backlinks, BacklinkIndex};

// 重新导出 srs 模块中的公共 API
pub use srs::{is_correct, is_due, process_review, Quality, ReviewRecord, SrsData};

pub use collection::Collection;
pub use config::EngineConfig;
pub use id::{validate_id, validate_id_length, IdGenerator};
pub use search::{HybridSearch, SearchMode, SearchQuery, SearchResults, SearchSource};
pub use tool::{FakeTool, LinkDirection, ListFilter, NoteTool, ZkTool};
