pub mod error;

pub mod config;

pub mod logging;
pub use logging::LoggerBuilder;

pub mod cache {
    pub mod dcache;
    pub use dcache::DirCache;
}

pub mod fs {
    pub mod entry;
    pub use entry::{Entry, EntryKey, EntryType, Origin};

    pub mod scanner;
    pub use scanner::{CancelFlag, ScanOptions};

    pub mod path_trie;
    pub use path_trie::PathTrie;
}

pub mod model {
    pub mod entry_store;
    pub use entry_store::{EntryStore, TreeViolation};

    pub mod watch;
    pub use watch::{PendingEvent, WatchMeta};

    pub mod view;
    pub use view::{CustomKind, CustomView, View};

    pub mod fs_state;
    pub use fs_state::FSState;
}

pub mod sort {
    pub mod keys;
    pub use keys::{SignedKey, SortKey, SortKeys};

    pub mod strnum;
    pub use strnum::{compare_names, strnumcmp};

    pub mod groups;
    pub use groups::GroupCache;

    pub mod engine;
    pub use engine::SortContext;
}

pub mod filter {
    pub mod matcher;
    pub use matcher::Matcher;

    pub mod engine;
    pub use engine::{DotDirs, FilterState};

    pub mod local;
    pub use local::{LocalFilter, LocalFilterStatus};
}

pub mod tree {
    pub mod builder;
    pub use builder::{build_custom_tree, build_tree};

    pub mod fold;
}

pub mod compare {
    pub mod hashing;

    pub mod align;

    pub mod engine;
    pub use engine::{CompareOptions, CompareOutcome, CompareType, ListingMode};
}

pub mod session;

#[cfg(test)]
pub mod test_support;

pub use error::{FlistError, FlistResult};

pub use model::{fs_state::FSState, view::View};
