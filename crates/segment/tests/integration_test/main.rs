/// Integration tests for the dataset writer covering the on-disk layout,
/// index contents, reruns, and stale partition cleanup.

mod dataset_write;
mod helpers;
