//! Test doubles for store failure paths.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::memory::InMemoryStore;
use crate::store::{CompletedPart, ListPage, ObjectMeta, ObjectReader, ObjectStore};

/// An [`InMemoryStore`] whose operations can be made to fail on demand.
///
/// Rules are keyed by trait method name (`"put"`, `"list"`, ...) and may be
/// narrowed to a single key. Every call is counted per method name.
#[derive(Debug, Default)]
pub(crate) struct FaultyStore {
    pub(crate) inner: InMemoryStore,
    rules: Mutex<Vec<(&'static str, Option<String>)>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl FaultyStore {
    pub(crate) fn fail(&self, op: &'static str) {
        self.rules.lock().push((op, None));
    }

    pub(crate) fn fail_key(&self, op: &'static str, key: &str) {
        self.rules.lock().push((op, Some(key.to_owned())));
    }

    pub(crate) fn heal(&self, op: &'static str) {
        self.rules.lock().retain(|(o, _)| *o != op);
    }

    pub(crate) fn calls(&self, op: &'static str) -> usize {
        self.calls.lock().get(op).copied().unwrap_or(0)
    }

    fn check(&self, op: &'static str, key: &str) -> StoreResult<()> {
        *self.calls.lock().entry(op).or_default() += 1;
        let failing = self
            .rules
            .lock()
            .iter()
            .any(|(o, k)| *o == op && k.as_deref().is_none_or(|k| k == key));
        if failing {
            return Err(StoreError::Other(anyhow::anyhow!("injected {op} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn get(&self, key: &str) -> StoreResult<ObjectReader> {
        self.check("get", key)?;
        self.inner.get(key).await
    }

    async fn get_from(&self, key: &str, offset: u64) -> StoreResult<ObjectReader> {
        self.check("get_from", key)?;
        self.inner.get_from(key, offset).await
    }

    async fn get_range(&self, key: &str, start: u64, end: u64) -> StoreResult<Bytes> {
        self.check("get_range", key)?;
        self.inner.get_range(key, start, end).await
    }

    async fn put(&self, key: &str, body: Bytes) -> StoreResult<()> {
        self.check("put", key)?;
        self.inner.put(key, body).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.check("delete", key)?;
        self.inner.delete(key).await
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectMeta> {
        self.check("head", key)?;
        self.inner.head(key).await
    }

    async fn list(
        &self,
        prefix: &str,
        continuation_token: Option<&str>,
        max_keys: Option<usize>,
    ) -> StoreResult<ListPage> {
        self.check("list", prefix)?;
        self.inner.list(prefix, continuation_token, max_keys).await
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> StoreResult<()> {
        self.check("copy", src_key)?;
        self.inner.copy(src_key, dst_key).await
    }

    async fn start_multipart(&self, key: &str) -> StoreResult<String> {
        self.check("start_multipart", key)?;
        self.inner.start_multipart(key).await
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> StoreResult<String> {
        self.check("upload_part", key)?;
        self.inner
            .upload_part(key, upload_id, part_number, body)
            .await
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<()> {
        self.check("complete_multipart", key)?;
        self.inner.complete_multipart(key, upload_id, parts).await
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> StoreResult<()> {
        self.check("abort_multipart", key)?;
        self.inner.abort_multipart(key, upload_id).await
    }
}
