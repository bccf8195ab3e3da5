//! Leaf handlers serving a single body: in-memory bytes or a file on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{
    ContentElement, ContentIter, Handler, HandlerBuilder, HandlerError, HandlerFuture, ParentRef,
    PrepareFuture,
};
use crate::http::{ContentType, Request, Response, StatusCode};

#[derive(Debug, Clone)]
enum Source {
    Memory(Bytes),
    File(PathBuf),
}

/// Serves the same body for every request routed to it.
///
/// File-backed resources are read once, either during
/// [`prepare`](Handler::prepare) or on the first request, and served from
/// memory afterwards.
pub struct Resource {
    parent: ParentRef,
    source: Source,
    content_type: Option<ContentType>,
    loaded: OnceCell<Bytes>,
}

impl Resource {
    /// Describes an in-memory resource, to be built under a parent later.
    pub fn bytes(body: impl Into<Bytes>, content_type: ContentType) -> ResourceBuilder {
        ResourceBuilder {
            source: Source::Memory(body.into()),
            content_type: Some(content_type),
        }
    }

    /// Describes a file-backed resource; the media type is guessed from the
    /// file extension.
    pub fn file(path: impl AsRef<Path>) -> ResourceBuilder {
        let path = path.as_ref();
        let content_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ContentType::from_extension);
        ResourceBuilder {
            source: Source::File(path.to_path_buf()),
            content_type,
        }
    }

    /// Returns the media type this resource is served with, if known.
    pub fn content_type(&self) -> Option<ContentType> {
        self.content_type
    }

    async fn body(&self) -> Result<&Bytes, HandlerError> {
        self.loaded
            .get_or_try_init(|| async {
                match &self.source {
                    Source::Memory(bytes) => Ok::<_, HandlerError>(bytes.clone()),
                    Source::File(path) => {
                        let data = tokio::fs::read(path).await?;
                        debug!(path = %path.display(), bytes = data.len(), "resource loaded");
                        Ok(Bytes::from(data))
                    }
                }
            })
            .await
    }
}

impl Handler for Resource {
    fn parent(&self) -> Option<Arc<dyn Handler>> {
        self.parent.upgrade()
    }

    fn content<'a>(&'a self, _request: &'a Request) -> ContentIter<'a> {
        Box::new(std::iter::once(ContentElement::new("", self.content_type)))
    }

    fn handle<'a>(&'a self, _request: &'a Request) -> HandlerFuture<'a> {
        Box::pin(async move {
            let body = self.body().await?;
            let mut response = Response::new(StatusCode::Ok).body_bytes(body.to_vec());
            if let Some(content_type) = self.content_type {
                response = response.content_type(content_type);
            }
            Ok(Some(response))
        })
    }

    fn prepare(&self) -> PrepareFuture<'_> {
        Box::pin(async move {
            self.body().await?;
            Ok(())
        })
    }
}

/// Deferred construction of a [`Resource`].
#[derive(Debug, Clone)]
pub struct ResourceBuilder {
    source: Source,
    content_type: Option<ContentType>,
}

impl ResourceBuilder {
    /// Overrides the media type.
    #[must_use]
    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Builds the concrete resource under `parent`.
    pub fn build_resource(&self, parent: ParentRef) -> Arc<Resource> {
        Arc::new(Resource {
            parent,
            source: self.source.clone(),
            content_type: self.content_type,
            loaded: OnceCell::new(),
        })
    }
}

impl HandlerBuilder for ResourceBuilder {
    fn build(&self, parent: ParentRef) -> Arc<dyn Handler> {
        self.build_resource(parent)
    }
}
