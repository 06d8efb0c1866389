use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{
    NewProduct, ProductImage, ProviderClient, ProviderError, ProviderProduct, Shop, UploadedAsset,
};

/// Scriptable in-process provider for saga tests.
#[derive(Default)]
pub(crate) struct FakeProvider {
    products: Mutex<HashMap<String, NewProduct>>,
    pub mockups: Mutex<Vec<String>>,
    pub fail_upload: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_publish: AtomicBool,
    pub fail_get: AtomicBool,
    pub uploads: AtomicUsize,
    pub creates: AtomicUsize,
    pub publishes: AtomicUsize,
}

impl FakeProvider {
    pub fn with_mockups(mockups: &[&str]) -> Self {
        let provider = Self::default();
        *provider.mockups.lock().unwrap() = mockups.iter().map(|m| m.to_string()).collect();
        provider
    }

    pub fn created(&self, product_id: &str) -> Option<NewProduct> {
        self.products.lock().unwrap().get(product_id).cloned()
    }

    fn unavailable() -> ProviderError {
        ProviderError::Http {
            status: 503,
            body: "maintenance".to_string(),
        }
    }
}

#[async_trait]
impl ProviderClient for FakeProvider {
    async fn list_shops(&self) -> Result<Vec<Shop>, ProviderError> {
        Ok(vec![Shop {
            id: 1,
            title: "Test shop".to_string(),
        }])
    }

    async fn list_products(&self, _shop_id: u64) -> Result<Vec<ProviderProduct>, ProviderError> {
        let products = self.products.lock().unwrap();
        Ok(products
            .iter()
            .map(|(id, p)| ProviderProduct {
                id: id.clone(),
                title: p.title.clone(),
                images: Vec::new(),
                visible: false,
            })
            .collect())
    }

    async fn upload_asset(&self, file_name: &str, _url: &str) -> Result<UploadedAsset, ProviderError> {
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(UploadedAsset {
            id: format!("asset-{}", n),
            preview_url: Some(format!("https://cdn.provider.test/{}", file_name)),
        })
    }

    async fn create_product(&self, _shop_id: u64, product: &NewProduct) -> Result<ProviderProduct, ProviderError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ProviderError::Http {
                status: 400,
                body: "invalid blueprint".to_string(),
            });
        }
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("prov-prod-{}", n);
        self.products.lock().unwrap().insert(id.clone(), product.clone());
        Ok(ProviderProduct {
            id,
            title: product.title.clone(),
            images: Vec::new(),
            visible: false,
        })
    }

    async fn publish_product(&self, _shop_id: u64, _product_id: &str) -> Result<(), ProviderError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.publishes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_product(&self, _shop_id: u64, product_id: &str) -> Result<ProviderProduct, ProviderError> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let title = self
            .products
            .lock()
            .unwrap()
            .get(product_id)
            .map(|p| p.title.clone())
            .ok_or_else(|| ProviderError::Http {
                status: 404,
                body: "not found".to_string(),
            })?;
        let images = self
            .mockups
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .map(|(i, src)| ProductImage {
                src: src.clone(),
                is_default: i == 0,
            })
            .collect();
        Ok(ProviderProduct {
            id: product_id.to_string(),
            title,
            images,
            visible: false,
        })
    }
}
