//! The object-storage boundary the export engine drives multipart uploads
//! through. Kept as a trait (rather than calling `aws_sdk_s3::Client`
//! directly from `export.rs`) so tests can swap in an in-memory fake.

use std::future::Future;
use std::pin::Pin;

use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::primitives::ByteStream;

use crate::error::MarcError;
use atrium_lockstore::MultipartUploadPart;

pub type S3Future<'a, T> = Pin<Box<dyn Future<Output = Result<T, MarcError>> + Send + 'a>>;

/// Minimum size (inclusive) a non-final multipart part must reach before
/// it may be uploaded (§4.7, §8 boundary property).
pub const MULTIPART_MIN_PART_SIZE: usize = 5 * 1024 * 1024;

pub trait MarcObjectStore: Send + Sync {
    fn create_multipart_upload<'a>(&'a self, bucket: &'a str, key: &'a str) -> S3Future<'a, String>;

    fn upload_part<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        upload_id: &'a str,
        part_number: i32,
        body: Vec<u8>,
    ) -> S3Future<'a, MultipartUploadPart>;

    fn complete_multipart_upload<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        upload_id: &'a str,
        parts: Vec<MultipartUploadPart>,
    ) -> S3Future<'a, ()>;

    fn abort_multipart_upload<'a>(&'a self, bucket: &'a str, key: &'a str, upload_id: &'a str) -> S3Future<'a, ()>;
}

pub struct AwsS3MultipartStore {
    client: aws_sdk_s3::Client,
}

impl AwsS3MultipartStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

impl MarcObjectStore for AwsS3MultipartStore {
    fn create_multipart_upload<'a>(&'a self, bucket: &'a str, key: &'a str) -> S3Future<'a, String> {
        Box::pin(async move {
            let output = self
                .client
                .create_multipart_upload()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| MarcError::Upload(e.to_string()))?;
            output.upload_id().map(str::to_string).ok_or_else(|| MarcError::Upload("S3 did not return an upload id".to_string()))
        })
    }

    fn upload_part<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        upload_id: &'a str,
        part_number: i32,
        body: Vec<u8>,
    ) -> S3Future<'a, MultipartUploadPart> {
        Box::pin(async move {
            let output = self
                .client
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(body))
                .send()
                .await
                .map_err(|e| MarcError::Upload(e.to_string()))?;
            let e_tag = output.e_tag().map(str::to_string).ok_or_else(|| MarcError::Upload("S3 did not return an ETag".to_string()))?;
            Ok(MultipartUploadPart { part_number, e_tag })
        })
    }

    fn complete_multipart_upload<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        upload_id: &'a str,
        parts: Vec<MultipartUploadPart>,
    ) -> S3Future<'a, ()> {
        Box::pin(async move {
            let completed_parts: Vec<CompletedPart> = parts
                .into_iter()
                .map(|p| CompletedPart::builder().part_number(p.part_number).e_tag(p.e_tag).build())
                .collect();
            self.client
                .complete_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .multipart_upload(CompletedMultipartUpload::builder().set_parts(Some(completed_parts)).build())
                .send()
                .await
                .map_err(|e| MarcError::Upload(e.to_string()))?;
            Ok(())
        })
    }

    fn abort_multipart_upload<'a>(&'a self, bucket: &'a str, key: &'a str, upload_id: &'a str) -> S3Future<'a, ()> {
        Box::pin(async move {
            self.client
                .abort_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .send()
                .await
                .map_err(|e| MarcError::Upload(e.to_string()))?;
            Ok(())
        })
    }
}
