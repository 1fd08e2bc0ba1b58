pub mod index;
pub mod partition;
pub mod writer;

// Re-export key types
pub use index::{DataFile, DatasetIndex, FileMetadata, IndexMetadata, PartitionEntry, RecentEntry};
pub use partition::{partition_by_quarter, recent_window, Partition, PartitionSet, RecentWindow};
pub use writer::{write_json_atomic, DatasetWriter, WriteError, WriteSummary};
