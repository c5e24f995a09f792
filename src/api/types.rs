//! Response types shared by both API generations.
//!
//! The new and old APIs name the same fields differently (`catId` /
//! `categoryId`, `productId` / `goodsId`, …). Serde aliases absorb those
//! differences so the workflow only ever sees one shape.

use crate::config::ApiGeneration;
use serde::{Deserialize, Serialize};

/// Temu's standard parent spec id for colors.
pub const COLOR_PARENT_SPEC_ID: u64 = 1001;
/// Temu's standard parent spec id for sizes.
pub const SIZE_PARENT_SPEC_ID: u64 = 3001;

/// One node of the category tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(alias = "catId", alias = "categoryId")]
    pub cat_id: u64,
    #[serde(alias = "catName", alias = "categoryName")]
    pub name: String,
    #[serde(alias = "parentCatId", alias = "parentId", default)]
    pub parent_id: u64,
    #[serde(alias = "catLevel", default)]
    pub level: u32,
    #[serde(alias = "isLeaf", alias = "leaf", default)]
    pub is_leaf: bool,
}

/// An allowed value of a template property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    #[serde(alias = "valueId", default)]
    pub vid: u64,
    #[serde(alias = "propValue")]
    pub value: String,
}

/// A product property the category template asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateProperty {
    #[serde(alias = "templatePid", default)]
    pub template_pid: u64,
    #[serde(alias = "propertyId", default)]
    pub pid: u64,
    #[serde(alias = "refPid", default)]
    pub ref_pid: u64,
    #[serde(alias = "propName")]
    pub name: String,
    #[serde(alias = "isRequired", default)]
    pub required: bool,
    #[serde(alias = "propertyValues", default)]
    pub values: Vec<PropertyValue>,
    #[serde(alias = "valueUnit", default)]
    pub value_unit: Vec<String>,
}

impl TemplateProperty {
    /// Find an allowed value by case-insensitive exact match, then by containment.
    pub fn match_value(&self, wanted: &str) -> Option<&PropertyValue> {
        let wanted = wanted.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.values
            .iter()
            .find(|v| v.value.to_lowercase() == wanted)
            .or_else(|| {
                self.values.iter().find(|v| {
                    let value = v.value.to_lowercase();
                    value.contains(&wanted) || wanted.contains(&value)
                })
            })
    }

    /// Free-text properties have no enumerated values.
    pub fn is_free_text(&self) -> bool {
        self.values.is_empty()
    }
}

/// A parent spec (color, size, …) offered by a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentSpec {
    #[serde(alias = "parentSpecId")]
    pub parent_spec_id: u64,
    #[serde(alias = "parentSpecName")]
    pub parent_spec_name: String,
}

/// Category template: the properties and parent specs a listing must use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTemplate {
    pub cat_id: u64,
    pub properties: Vec<TemplateProperty>,
    pub parent_specs: Vec<ParentSpec>,
}

impl CategoryTemplate {
    /// Parent spec id for colors, falling back to Temu's standard id.
    pub fn color_parent_spec(&self) -> u64 {
        self.find_parent_spec(&["color", "colour", "颜色"])
            .unwrap_or(COLOR_PARENT_SPEC_ID)
    }

    /// Parent spec id for sizes, falling back to Temu's standard id.
    pub fn size_parent_spec(&self) -> u64 {
        self.find_parent_spec(&["size", "尺码", "尺寸"])
            .unwrap_or(SIZE_PARENT_SPEC_ID)
    }

    fn find_parent_spec(&self, names: &[&str]) -> Option<u64> {
        self.parent_specs
            .iter()
            .find(|p| {
                let name = p.parent_spec_name.to_lowercase();
                names.iter().any(|n| name.contains(n))
            })
            .map(|p| p.parent_spec_id)
    }

    pub fn required_properties(&self) -> impl Iterator<Item = &TemplateProperty> {
        self.properties.iter().filter(|p| p.required)
    }
}

/// A resolved spec value (a particular color or size).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecRef {
    pub parent_spec_id: u64,
    pub parent_spec_name: String,
    pub spec_id: u64,
    pub spec_name: String,
}

/// Result of an image upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedImage {
    #[serde(alias = "imageUrl")]
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// Problems reported by the remote compliance check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteCompliance {
    pub passed: bool,
    pub issues: Vec<String>,
}

/// A created product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedGoods {
    pub goods_id: u64,
    pub sku_ids: Vec<u64>,
    pub generation: ApiGeneration,
}
