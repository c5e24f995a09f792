//! The two generations of Temu's goods API behind one trait.
//!
//! | Operation | New (`bg.goods.*`) | Old (`bg.local.goods.*`) |
//! |-----------|--------------------|--------------------------|
//! | categories | `bg.goods.cats.get` | `bg.local.goods.cats.get` |
//! | template | `bg.goods.attrs.get` | `bg.local.goods.template.get` |
//! | spec id | `bg.goods.spec.id.get` | `bg.local.goods.spec.id.get` |
//! | upload | `bg.goods.image.upload` | `bg.local.goods.image.upload` |
//! | compliance | `bg.goods.compliance.check` | `bg.local.goods.compliance.check` |
//! | create | `bg.goods.add` | `bg.local.goods.add` |
//!
//! Both share [`TemuClient`]; they differ in parameter names, response keys
//! and the product payload, which [`crate::pipeline::transform`] builds.

use crate::api::client::TemuClient;
use crate::api::types::{
    Category, CategoryTemplate, CreatedGoods, ParentSpec, RemoteCompliance, SpecRef,
    TemplateProperty, UploadedImage,
};
use crate::config::{ApiGeneration, ApiTypeOverrides};
use crate::error::ListingError;
use crate::pipeline::transform::{to_goods_add, to_local_goods_add, GoodsDraft};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Operations the listing workflow needs from Temu.
#[async_trait]
pub trait TemuApi: Send + Sync {
    /// Generation currently serving calls.
    fn generation(&self) -> ApiGeneration;

    /// Children of `parent_id` (`0` for the root).
    async fn categories(&self, parent_id: u64) -> Result<Vec<Category>, ListingError>;

    /// Property template of a leaf category.
    async fn template(&self, cat_id: u64) -> Result<CategoryTemplate, ListingError>;

    /// Spec id for a color/size value under a parent spec.
    async fn spec_id(
        &self,
        cat_id: u64,
        parent_spec_id: u64,
        name: &str,
    ) -> Result<SpecRef, ListingError>;

    /// Upload an encoded image; returns the Temu-hosted URL.
    async fn upload_image(&self, bytes: &[u8], mime: &str) -> Result<UploadedImage, ListingError>;

    /// Remote compliance check of a product draft.
    async fn compliance(&self, draft: &GoodsDraft) -> Result<RemoteCompliance, ListingError>;

    /// Create the product.
    async fn add_goods(&self, draft: &GoodsDraft) -> Result<CreatedGoods, ListingError>;
}

/// API names used by one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiNames {
    pub categories: String,
    pub template: String,
    pub spec_id: String,
    pub upload_image: String,
    pub compliance: String,
    pub add_goods: String,
}

impl ApiNames {
    pub fn for_generation(generation: ApiGeneration, overrides: &ApiTypeOverrides) -> Self {
        let prefix = match generation {
            ApiGeneration::New => "bg.goods",
            ApiGeneration::Old => "bg.local.goods",
        };
        let template = match generation {
            ApiGeneration::New => "bg.goods.attrs.get".to_string(),
            ApiGeneration::Old => "bg.local.goods.template.get".to_string(),
        };
        let pick = |o: &Option<String>, default: String| o.clone().unwrap_or(default);
        Self {
            categories: pick(&overrides.categories, format!("{prefix}.cats.get")),
            template: pick(&overrides.template, template),
            spec_id: pick(&overrides.spec_id, format!("{prefix}.spec.id.get")),
            upload_image: pick(&overrides.upload_image, format!("{prefix}.image.upload")),
            compliance: pick(&overrides.compliance, format!("{prefix}.compliance.check")),
            add_goods: pick(&overrides.add_goods, format!("{prefix}.add")),
        }
    }
}

// ── New generation ───────────────────────────────────────────────────────

/// `bg.goods.*` — the current goods API.
#[derive(Debug, Clone)]
pub struct GoodsApi {
    client: TemuClient,
    names: ApiNames,
}

impl GoodsApi {
    pub fn new(client: TemuClient) -> Self {
        Self::with_overrides(client, &ApiTypeOverrides::default())
    }

    pub fn with_overrides(client: TemuClient, overrides: &ApiTypeOverrides) -> Self {
        Self {
            client,
            names: ApiNames::for_generation(ApiGeneration::New, overrides),
        }
    }

    pub fn names(&self) -> &ApiNames {
        &self.names
    }
}

#[async_trait]
impl TemuApi for GoodsApi {
    fn generation(&self) -> ApiGeneration {
        ApiGeneration::New
    }

    async fn categories(&self, parent_id: u64) -> Result<Vec<Category>, ListingError> {
        let api = &self.names.categories;
        let result = self.client.call(api, json!({ "parentCatId": parent_id })).await?;
        parse_list(api, &result, &["goodsCatsList", "categoryList"])
    }

    async fn template(&self, cat_id: u64) -> Result<CategoryTemplate, ListingError> {
        let api = &self.names.template;
        let result = self.client.call(api, json!({ "catId": cat_id })).await?;
        parse_template(api, cat_id, &result)
    }

    async fn spec_id(
        &self,
        cat_id: u64,
        parent_spec_id: u64,
        name: &str,
    ) -> Result<SpecRef, ListingError> {
        let api = &self.names.spec_id;
        let result = self
            .client
            .call(
                api,
                json!({ "catId": cat_id, "parentSpecId": parent_spec_id, "childSpecName": name }),
            )
            .await?;
        parse_spec(parent_spec_id, name, &result)
    }

    async fn upload_image(&self, bytes: &[u8], mime: &str) -> Result<UploadedImage, ListingError> {
        let api = &self.names.upload_image;
        let params = json!({
            "imageBizType": 1,
            "image": format!("data:{mime};base64,{}", STANDARD.encode(bytes)),
            "options": { "boost": false, "doIntelligenceCrop": false, "sizeMode": 0 }
        });
        let uploaded: UploadedImage = self.client.call_typed(api, params).await?;
        debug!("Uploaded {} bytes → {}", bytes.len(), uploaded.url);
        Ok(uploaded)
    }

    async fn compliance(&self, draft: &GoodsDraft) -> Result<RemoteCompliance, ListingError> {
        let api = &self.names.compliance;
        let result = self
            .client
            .call(api, json!({ "catId": draft.cat_id, "goods": to_goods_add(draft) }))
            .await?;
        Ok(parse_compliance(&result))
    }

    async fn add_goods(&self, draft: &GoodsDraft) -> Result<CreatedGoods, ListingError> {
        let api = &self.names.add_goods;
        let result = self.client.call(api, to_goods_add(draft)).await?;
        let goods_id = parse_id(api, &result, &["productId", "goodsId"])?;
        let sku_ids = collect_ids(&result, &["productSkuList", "skuInfoList"], &["productSkuId", "skuId"]);
        info!("Created product {} via {}", goods_id, api);
        Ok(CreatedGoods {
            goods_id,
            sku_ids,
            generation: ApiGeneration::New,
        })
    }
}

// ── Old generation ───────────────────────────────────────────────────────

/// `bg.local.goods.*` — the earlier goods API, kept for accounts that have
/// not been migrated.
#[derive(Debug, Clone)]
pub struct LocalGoodsApi {
    client: TemuClient,
    names: ApiNames,
}

impl LocalGoodsApi {
    pub fn new(client: TemuClient) -> Self {
        Self::with_overrides(client, &ApiTypeOverrides::default())
    }

    pub fn with_overrides(client: TemuClient, overrides: &ApiTypeOverrides) -> Self {
        Self {
            client,
            names: ApiNames::for_generation(ApiGeneration::Old, overrides),
        }
    }

    pub fn names(&self) -> &ApiNames {
        &self.names
    }
}

#[async_trait]
impl TemuApi for LocalGoodsApi {
    fn generation(&self) -> ApiGeneration {
        ApiGeneration::Old
    }

    async fn categories(&self, parent_id: u64) -> Result<Vec<Category>, ListingError> {
        let api = &self.names.categories;
        let result = self.client.call(api, json!({ "parentCatId": parent_id })).await?;
        parse_list(api, &result, &["categoryList", "goodsCatsList"])
    }

    async fn template(&self, cat_id: u64) -> Result<CategoryTemplate, ListingError> {
        let api = &self.names.template;
        let result = self.client.call(api, json!({ "catId": cat_id })).await?;
        parse_template(api, cat_id, &result)
    }

    async fn spec_id(
        &self,
        cat_id: u64,
        parent_spec_id: u64,
        name: &str,
    ) -> Result<SpecRef, ListingError> {
        let api = &self.names.spec_id;
        let result = self
            .client
            .call(
                api,
                json!({ "catId": cat_id, "parentSpecId": parent_spec_id, "specName": name }),
            )
            .await?;
        parse_spec(parent_spec_id, name, &result)
    }

    async fn upload_image(&self, bytes: &[u8], mime: &str) -> Result<UploadedImage, ListingError> {
        let api = &self.names.upload_image;
        let image_type = mime.rsplit('/').next().unwrap_or("jpeg");
        let params = json!({
            "imageBase64": STANDARD.encode(bytes),
            "imageType": image_type,
        });
        let uploaded: UploadedImage = self.client.call_typed(api, params).await?;
        debug!("Uploaded {} bytes → {}", bytes.len(), uploaded.url);
        Ok(uploaded)
    }

    async fn compliance(&self, draft: &GoodsDraft) -> Result<RemoteCompliance, ListingError> {
        let api = &self.names.compliance;
        let mut params = to_local_goods_add(draft);
        if let Value::Object(map) = &mut params {
            map.insert("catId".into(), json!(draft.cat_id));
        }
        let result = self.client.call(api, params).await?;
        Ok(parse_compliance(&result))
    }

    async fn add_goods(&self, draft: &GoodsDraft) -> Result<CreatedGoods, ListingError> {
        let api = &self.names.add_goods;
        let result = self.client.call(api, to_local_goods_add(draft)).await?;
        let goods_id = parse_id(api, &result, &["goodsId", "productId"])?;
        let sku_ids = collect_ids(&result, &["skuInfoList", "productSkuList"], &["skuId", "productSkuId"]);
        info!("Created goods {} via {}", goods_id, api);
        Ok(CreatedGoods {
            goods_id,
            sku_ids,
            generation: ApiGeneration::Old,
        })
    }
}

// ── Response parsing ─────────────────────────────────────────────────────

/// Deserialise the first array found under `keys` (or `result` itself).
fn parse_list<T: DeserializeOwned>(
    api_type: &str,
    result: &Value,
    keys: &[&str],
) -> Result<Vec<T>, ListingError> {
    let array = if result.is_array() {
        Some(result)
    } else {
        keys.iter().find_map(|k| result.get(*k).filter(|v| v.is_array()))
    };
    match array {
        Some(items) => serde_json::from_value(items.clone()).map_err(|e| {
            ListingError::InvalidResponse {
                api_type: api_type.to_string(),
                detail: e.to_string(),
            }
        }),
        None if result.is_null() => Ok(Vec::new()),
        None => Err(ListingError::InvalidResponse {
            api_type: api_type.to_string(),
            detail: format!("expected one of {keys:?}"),
        }),
    }
}

fn parse_template(
    api_type: &str,
    cat_id: u64,
    result: &Value,
) -> Result<CategoryTemplate, ListingError> {
    let properties: Vec<TemplateProperty> =
        parse_list(api_type, result, &["properties", "goodsProperties", "propertyList"])?;
    let parent_specs: Vec<ParentSpec> = ["parentSpecs", "goodsSpecProperties", "specProperties"]
        .iter()
        .find_map(|k| result.get(*k).filter(|v| v.is_array()))
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()
        .map_err(|e| ListingError::InvalidResponse {
            api_type: api_type.to_string(),
            detail: format!("parent specs: {e}"),
        })?
        .unwrap_or_default();

    Ok(CategoryTemplate {
        cat_id,
        properties,
        parent_specs,
    })
}

fn parse_spec(parent_spec_id: u64, name: &str, result: &Value) -> Result<SpecRef, ListingError> {
    let spec_id = ["specId", "spec_id"]
        .iter()
        .find_map(|k| result.get(*k).and_then(as_u64))
        .filter(|id| *id > 0)
        .ok_or_else(|| ListingError::SpecNotResolved {
            parent_spec_id,
            name: name.to_string(),
        })?;
    let parent_spec_name = result
        .get("parentSpecName")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    Ok(SpecRef {
        parent_spec_id,
        parent_spec_name,
        spec_id,
        spec_name: name.to_string(),
    })
}

fn parse_compliance(result: &Value) -> RemoteCompliance {
    let issues: Vec<String> = ["issues", "failReasons", "checkResults"]
        .iter()
        .find_map(|k| result.get(*k).and_then(Value::as_array))
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(o) => ["msg", "reason", "message"]
                        .iter()
                        .find_map(|k| o.get(*k).and_then(Value::as_str))
                        .map(str::to_string),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    let passed = ["passed", "pass", "isPass"]
        .iter()
        .find_map(|k| result.get(*k).and_then(Value::as_bool))
        .unwrap_or(issues.is_empty());
    RemoteCompliance { passed, issues }
}

fn parse_id(api_type: &str, result: &Value, keys: &[&str]) -> Result<u64, ListingError> {
    keys.iter()
        .find_map(|k| result.get(*k).and_then(as_u64))
        .ok_or_else(|| ListingError::InvalidResponse {
            api_type: api_type.to_string(),
            detail: format!("no id under {keys:?}"),
        })
}

fn collect_ids(result: &Value, list_keys: &[&str], id_keys: &[&str]) -> Vec<u64> {
    list_keys
        .iter()
        .find_map(|k| result.get(*k).and_then(Value::as_array))
        .map(|items| {
            items
                .iter()
                .filter_map(|item| id_keys.iter().find_map(|k| item.get(*k).and_then(as_u64)))
                .collect()
        })
        .unwrap_or_default()
}

/// Ids arrive as numbers or numeric strings depending on the API.
fn as_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::tests::{test_client, ScriptedTransport};
    use crate::pipeline::transform::tests::sample_draft;
    use std::sync::Arc;

    fn ok(result: Value) -> Value {
        json!({"success": true, "errorCode": 1000000, "result": result})
    }

    #[test]
    fn names_follow_generation_and_overrides() {
        let new = ApiNames::for_generation(ApiGeneration::New, &ApiTypeOverrides::default());
        assert_eq!(new.add_goods, "bg.goods.add");
        assert_eq!(new.template, "bg.goods.attrs.get");

        let overrides = ApiTypeOverrides {
            compliance: Some("bg.local.goods.compliance.rules.get".into()),
            ..Default::default()
        };
        let old = ApiNames::for_generation(ApiGeneration::Old, &overrides);
        assert_eq!(old.add_goods, "bg.local.goods.add");
        assert_eq!(old.categories, "bg.local.goods.cats.get");
        assert_eq!(old.compliance, "bg.local.goods.compliance.rules.get");
    }

    #[tokio::test]
    async fn new_categories_parse_goods_cats_list() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_json(
            200,
            ok(json!({"goodsCatsList": [
                {"catId": 1, "catName": "Women", "isLeaf": false},
                {"catId": 2, "catName": "Men", "isLeaf": false}
            ]})),
        );
        let api = GoodsApi::new(test_client(Arc::clone(&transport)));

        let cats = api.categories(0).await.unwrap();
        assert_eq!(cats.len(), 2);
        assert_eq!(cats[1].name, "Men");

        let sent = transport.requests.lock().unwrap()[0].clone();
        assert_eq!(sent["type"], "bg.goods.cats.get");
        assert_eq!(sent["parentCatId"], 0);
    }

    #[tokio::test]
    async fn old_categories_parse_category_list() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_json(
            200,
            ok(json!({"categoryList": [{"categoryId": 9, "categoryName": "Tops", "leaf": true}]})),
        );
        let api = LocalGoodsApi::new(test_client(Arc::clone(&transport)));

        let cats = api.categories(3).await.unwrap();
        assert_eq!(cats[0].cat_id, 9);
        assert!(cats[0].is_leaf);
    }

    #[tokio::test]
    async fn template_reads_properties_and_parent_specs() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_json(
            200,
            ok(json!({
                "properties": [
                    {"templatePid": 11, "pid": 1, "name": "Material", "required": true,
                     "values": [{"vid": 100, "value": "Cotton"}]}
                ],
                "parentSpecs": [{"parentSpecId": 1001, "parentSpecName": "Color"}]
            })),
        );
        let api = GoodsApi::new(test_client(transport));

        let template = api.template(42).await.unwrap();
        assert_eq!(template.cat_id, 42);
        assert_eq!(template.properties[0].template_pid, 11);
        assert_eq!(template.color_parent_spec(), 1001);
    }

    #[tokio::test]
    async fn spec_id_accepts_string_ids() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_json(200, ok(json!({"specId": "5551"})));
        let api = LocalGoodsApi::new(test_client(Arc::clone(&transport)));

        let spec = api.spec_id(42, 3001, "XL").await.unwrap();
        assert_eq!(spec.spec_id, 5551);
        assert_eq!(spec.spec_name, "XL");

        let sent = transport.requests.lock().unwrap()[0].clone();
        assert_eq!(sent["specName"], "XL");
    }

    #[tokio::test]
    async fn missing_spec_id_is_unresolved() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_json(200, ok(json!({})));
        let api = GoodsApi::new(test_client(transport));

        let err = api.spec_id(42, 1001, "Red").await.unwrap_err();
        assert!(matches!(err, ListingError::SpecNotResolved { .. }));
    }

    #[tokio::test]
    async fn upload_sends_data_url() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_json(200, ok(json!({"url": "https://img.temu/1.jpg", "width": 800, "height": 800})));
        let api = GoodsApi::new(test_client(Arc::clone(&transport)));

        let uploaded = api.upload_image(b"\xFF\xD8jpeg", "image/jpeg").await.unwrap();
        assert_eq!(uploaded.url, "https://img.temu/1.jpg");

        let sent = transport.requests.lock().unwrap()[0].clone();
        assert!(sent["image"].as_str().unwrap().starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn add_goods_collects_ids_for_both_generations() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.push_json(
            200,
            ok(json!({"productId": 777, "productSkuList": [{"productSkuId": 1}, {"productSkuId": 2}]})),
        );
        transport.push_json(200, ok(json!({"goodsId": "888", "skuInfoList": [{"skuId": 3}]})));
        let client = test_client(Arc::clone(&transport));
        let draft = sample_draft();

        let created = GoodsApi::new(client.clone()).add_goods(&draft).await.unwrap();
        assert_eq!(created.goods_id, 777);
        assert_eq!(created.sku_ids, vec![1, 2]);

        let created = LocalGoodsApi::new(client).add_goods(&draft).await.unwrap();
        assert_eq!(created.goods_id, 888);
        assert_eq!(created.generation, ApiGeneration::Old);

        let requests = transport.requests.lock().unwrap();
        assert!(requests[0].get("productSkcReqs").is_some());
        assert!(requests[1].get("skuList").is_some());
    }

    #[test]
    fn compliance_parses_object_issues() {
        let report = parse_compliance(&json!({
            "failReasons": [{"msg": "title contains forbidden word"}, "missing label"]
        }));
        assert!(!report.passed);
        assert_eq!(report.issues.len(), 2);

        let report = parse_compliance(&Value::Null);
        assert!(report.passed);
    }
}
