use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::PerceiverError;
use crate::model::{ElementHandle, Locator};

/// Live access to one document: selector queries, visibility and serialized markup.
#[async_trait]
pub trait DocumentPort: Send + Sync {
    async fn query(&self, locator: &Locator) -> Result<Vec<ElementHandle>, PerceiverError>;
    async fn is_visible(&self, element: &ElementHandle) -> Result<bool, PerceiverError>;
    async fn markup(&self) -> Result<String, PerceiverError>;
}

#[async_trait]
impl<T> DocumentPort for Arc<T>
where
    T: DocumentPort + ?Sized,
{
    async fn query(&self, locator: &Locator) -> Result<Vec<ElementHandle>, PerceiverError> {
        (**self).query(locator).await
    }

    async fn is_visible(&self, element: &ElementHandle) -> Result<bool, PerceiverError> {
        (**self).is_visible(element).await
    }

    async fn markup(&self) -> Result<String, PerceiverError> {
        (**self).markup().await
    }
}
