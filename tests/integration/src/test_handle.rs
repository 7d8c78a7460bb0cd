//! File handle integration tests.

#[cfg(test)]
mod tests {
    use std::io::SeekFrom;

    use crate::{cleanup_bucket, create_test_bucket, s3_client, test_fs};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_write_on_close_and_read_back() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "handle").await;
        let fs = test_fs(&client, &bucket);

        let mut file = fs.create("/notes/today.txt").expect("create");
        file.write_str("hello ").expect("write");
        file.write_str("world").expect("write");
        assert!(!fs.exists("notes/today.txt").await);
        file.close().await.expect("close");

        let mut reader = fs.open("notes/today.txt").expect("open");
        let mut buf = vec![0u8; 64];
        let mut out = Vec::new();
        loop {
            let n = reader.read(&mut buf).await.expect("read");
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"hello world");

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_read_ranges_and_seek() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "range").await;
        let fs = test_fs(&client, &bucket);

        let mut file = fs.create("digits").expect("create");
        file.write(b"0123456789").expect("write");
        file.close().await.expect("close");

        let mut reader = fs.open("digits").expect("open");
        let mut buf = [0u8; 3];
        assert_eq!(reader.read_at(&mut buf, 4).await.expect("read_at"), 3);
        assert_eq!(&buf, b"456");
        assert_eq!(reader.read_at(&mut buf, 10).await.expect("read_at"), 0);

        reader.seek(SeekFrom::Start(8)).expect("seek");
        let n = reader.read(&mut buf).await.expect("read");
        assert_eq!(&buf[..n], b"89");

        let info = reader.stat().await.expect("stat");
        assert_eq!(info.size, 10);
        assert_eq!(info.name, "digits");

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_report_missing_object_on_read() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "missing").await;
        let fs = test_fs(&client, &bucket);

        let mut reader = fs.open("nope.bin").expect("open");
        let mut buf = [0u8; 8];
        let err = reader.read(&mut buf).await.expect_err("missing object");
        assert!(err.is_not_found(), "unexpected error: {err}");

        let err = fs.stat("nope.bin").await.expect_err("missing object");
        assert!(err.is_not_found(), "unexpected error: {err}");

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_rename_object() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "rename").await;
        let fs = test_fs(&client, &bucket);

        let mut file = fs.create("dir/old name.txt").expect("create");
        file.write_str("payload").expect("write");
        file.close().await.expect("close");

        fs.rename("dir/old name.txt", "dir/new name.txt")
            .await
            .expect("rename");
        assert!(!fs.exists("dir/old name.txt").await);
        assert!(fs.exists("dir/new name.txt").await);

        cleanup_bucket(&client, &bucket).await;
    }
}
