//! Directory tree integration tests.

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use s3fs_core::ObjectStore;

    use crate::{cleanup_bucket, create_test_bucket, s3_client, test_fs};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_create_and_remove_directory_tree() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "tree").await;
        let fs = test_fs(&client, &bucket);

        fs.mkdir_all("a/b/c").await.expect("mkdir_all");
        for level in ["a/", "a/b/", "a/b/c/"] {
            assert!(fs.exists(level).await, "missing marker {level}");
        }
        assert!(fs.is_dir("a/b").await.expect("is_dir"));

        fs.remove_all("a").await.expect("remove_all");
        fs.remove_all("a").await.expect("second remove_all");
        assert!(!fs.is_dir("a").await.expect("is_dir"));

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_walk_each_key_once() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "walk").await;
        let fs = test_fs(&client, &bucket);

        for key in ["d/x", "d/y", "d/sub/z", "dx"] {
            fs.store()
                .put(key, Bytes::from_static(b"1"))
                .await
                .expect("put");
        }

        let mut seen = Vec::new();
        fs.walk("d", |key, info| {
            info?;
            seen.push(key.to_owned());
            Ok(())
        }).await.expect("walk");
        assert_eq!(seen, vec!["d/sub/z", "d/x", "d/y"]);

        let entries = fs.read_dir("d", Some(2)).await.expect("read_dir");
        assert_eq!(entries.len(), 2);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_page_through_large_directories() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "pages").await;
        let fs = test_fs(&client, &bucket);

        for i in 0..1005 {
            fs.store()
                .put(&format!("many/{i:04}"), Bytes::new())
                .await
                .expect("put");
        }

        let mut count = 0;
        fs.walk("many", |_, info| {
            info?;
            count += 1;
            Ok(())
        }).await.expect("walk");
        assert_eq!(count, 1005);

        fs.remove_all("many/").await.expect("remove_all");
        assert!(fs.read_dir("many", None).await.expect("read_dir").is_empty());

        cleanup_bucket(&client, &bucket).await;
    }
}
