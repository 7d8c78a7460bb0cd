//! Chunked upload integration tests.

#[cfg(test)]
mod tests {
    use s3fs_core::{MIN_PART_SIZE, UploadState};

    use crate::{cleanup_bucket, create_test_bucket, s3_client, test_fs};

    const MIB: usize = 1024 * 1024;

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_complete_chunked_upload() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "mpu").await;
        let fs = test_fs(&client, &bucket);

        let upload = fs.new_multipart_upload("big.bin").await.expect("start");
        assert_eq!(upload.upload_part(vec![0xAA; 10 * MIB]).await.expect("part 1"), 1);
        assert_eq!(upload.upload_part(vec![0xBB; 10 * MIB]).await.expect("part 2"), 2);
        assert!(!fs.exists("big.bin").await);

        upload.complete().await.expect("complete");
        assert_eq!(upload.state().await, UploadState::Completed);

        let info = fs.stat("big.bin").await.expect("stat");
        assert_eq!(info.size, (20 * MIB) as u64);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_upload_from_reader() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "reader").await;
        let fs = test_fs(&client, &bucket);

        let payload = vec![7u8; 6 * MIB];
        let upload = fs.new_multipart_upload("stream.bin").await.expect("start");
        upload.set_part_size(MIN_PART_SIZE).await.expect("part size");

        let mut reader = payload.as_slice();
        let parts = upload
            .upload_from_reader(&mut reader)
            .await
            .expect("upload");
        assert_eq!(parts, 2);
        upload.complete().await.expect("complete");

        let info = fs.stat("stream.bin").await.expect("stat");
        assert_eq!(info.size, payload.len() as u64);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_leave_nothing_after_abort() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "abort").await;
        let fs = test_fs(&client, &bucket);

        let upload = fs.new_multipart_upload("gone.bin").await.expect("start");
        upload
            .upload_part(vec![1u8; MIN_PART_SIZE as usize])
            .await
            .expect("part");
        upload.abort().await.expect("abort");

        assert_eq!(upload.state().await, UploadState::Aborted);
        assert!(!fs.exists("gone.bin").await);
        assert!(upload.upload_part(vec![1u8; 8]).await.is_err());

        cleanup_bucket(&client, &bucket).await;
    }
}
