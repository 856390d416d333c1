//! Index maintenance commands.

use crate::backend::SearchBackend;
use crate::error::Result;

/// Number of documents currently stored in `index`.
pub async fn count_documents(backend: &dyn SearchBackend, index: &str) -> Result<u64> {
    let count = backend.count(index).await?;
    log::debug!("Index '{}' holds {} documents", index, count);
    Ok(count)
}

/// Drop `index`. Returns false when it did not exist.
pub async fn delete_index(backend: &dyn SearchBackend, index: &str) -> Result<bool> {
    let deleted = backend.delete_index(index).await?;
    if deleted {
        log::info!("Deleted index '{}'", index);
    } else {
        log::info!("Index '{}' did not exist", index);
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::models::IndexDocument;

    #[tokio::test]
    async fn test_count_then_delete() {
        let backend = MemoryBackend::new();
        let docs = vec![
            IndexDocument {
                id: "a".into(),
                title: "A".into(),
                ..IndexDocument::default()
            },
            IndexDocument {
                id: "b".into(),
                title: "B".into(),
                ..IndexDocument::default()
            },
        ];
        backend.bulk_upsert("papers", &docs).await.unwrap();

        assert_eq!(count_documents(&backend, "papers").await.unwrap(), 2);
        assert!(delete_index(&backend, "papers").await.unwrap());
        assert!(!delete_index(&backend, "papers").await.unwrap());
        assert!(count_documents(&backend, "papers").await.unwrap_err().is_unavailable());
    }
}
