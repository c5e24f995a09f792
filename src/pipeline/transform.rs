//! Scraped data → Temu product payload.
//!
//! [`build_draft`] assembles a generation-neutral [`GoodsDraft`] from the
//! scraped product, the mapped sizes, the category template and the
//! resolved spec ids. [`to_goods_add`] and [`to_local_goods_add`] then render
//! the draft into the request body of `bg.goods.add` or `bg.local.goods.add`.
//! Keeping the draft separate lets the adapter pick the payload shape only
//! once it knows which generation will serve the call.

use crate::api::types::{CategoryTemplate, SpecRef, TemplateProperty};
use crate::config::{ApiGeneration, ListingConfig, PackageSpec};
use crate::error::ListingError;
use crate::pipeline::scrape::SourceProduct;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Color name used when the source lists no colors.
pub const DEFAULT_COLOR: &str = "Multicolor";

/// A template property with the value chosen for this product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFill {
    pub template_pid: u64,
    pub pid: u64,
    pub ref_pid: u64,
    pub name: String,
    /// `None` for free-text properties.
    pub vid: Option<u64>,
    pub value: String,
    pub value_unit: String,
}

/// One sellable variant (color × size).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuDraft {
    pub size: Option<String>,
    /// Color spec first, then size spec when present.
    pub specs: Vec<SpecRef>,
    pub price_cents: u64,
    pub stock: u32,
    pub out_sku_sn: String,
}

/// All variants sharing one color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkcDraft {
    pub color: String,
    pub color_spec: SpecRef,
    pub images: Vec<String>,
    pub skus: Vec<SkuDraft>,
}

/// Generation-neutral product ready to be rendered into a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodsDraft {
    pub cat_id: u64,
    pub title: String,
    pub description: String,
    pub carousel_images: Vec<String>,
    pub properties: Vec<PropertyFill>,
    /// Required template properties that could not be filled.
    pub missing_properties: Vec<String>,
    pub skcs: Vec<SkcDraft>,
    pub currency: String,
    pub package: PackageSpec,
    pub shipment_limit_days: u32,
    pub out_goods_sn: String,
    pub source_url: String,
}

impl GoodsDraft {
    pub fn skus(&self) -> impl Iterator<Item = &SkuDraft> {
        self.skcs.iter().flat_map(|skc| skc.skus.iter())
    }

    pub fn sku_count(&self) -> usize {
        self.skus().count()
    }
}

/// Spec ids resolved for the product's colors and sizes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSpecs {
    pub colors: Vec<SpecRef>,
    pub sizes: Vec<SpecRef>,
}

/// Assemble a [`GoodsDraft`].
///
/// `images` are the carousel URLs in order (Temu-hosted after upload, or
/// source URLs in a dry run). A required property that cannot be filled is
/// an error, except in a dry run where it is recorded in
/// [`GoodsDraft::missing_properties`] for the compliance report.
pub fn build_draft(
    product: &SourceProduct,
    template: &CategoryTemplate,
    specs: &ResolvedSpecs,
    images: &[String],
    config: &ListingConfig,
) -> Result<GoodsDraft, ListingError> {
    let title = truncate_title(
        config.title_override.as_deref().unwrap_or(&product.title),
        config.max_title_chars,
    );

    let (properties, missing_properties) = fill_properties(product, template, config);
    if let Some(first) = missing_properties.first() {
        if !config.dry_run {
            return Err(ListingError::MissingRequiredProperty { name: first.clone() });
        }
    }

    let price_cents = match product.price_cents.or(config.fallback_price_cents) {
        Some(base) => apply_multiplier(base, config.price_multiplier),
        None => {
            warn!("No price on the source page and no fallback price configured");
            0
        }
    };

    let skcs = specs
        .colors
        .iter()
        .enumerate()
        .map(|(ci, color_spec)| {
            let color = color_spec.spec_name.clone();
            let color_part = code_part(&color_spec.spec_name, 'C', ci);
            let skus = if specs.sizes.is_empty() {
                vec![sku(config, color_spec, &color_part, None, price_cents)]
            } else {
                specs
                    .sizes
                    .iter()
                    .enumerate()
                    .map(|(si, size_spec)| {
                        let size_part = code_part(&size_spec.spec_name, 'S', si);
                        sku(
                            config,
                            color_spec,
                            &color_part,
                            Some((size_spec, &size_part)),
                            price_cents,
                        )
                    })
                    .collect()
            };
            SkcDraft {
                color,
                color_spec: color_spec.clone(),
                images: images.to_vec(),
                skus,
            }
        })
        .collect::<Vec<_>>();

    let out_goods_sn = sku_code(&[
        config.sku_prefix.as_str(),
        product.sku.as_deref().unwrap_or(""),
    ]);

    let draft = GoodsDraft {
        cat_id: template.cat_id,
        title,
        description: product.description.clone(),
        carousel_images: images.to_vec(),
        properties,
        missing_properties,
        skcs,
        currency: product
            .currency
            .clone()
            .unwrap_or_else(|| config.currency.clone()),
        package: config.package,
        shipment_limit_days: config.shipment_limit_days,
        out_goods_sn,
        source_url: product.url.clone(),
    };
    debug!(
        "Draft for cat {}: {} SKCs, {} SKUs, {} properties",
        draft.cat_id,
        draft.skcs.len(),
        draft.sku_count(),
        draft.properties.len()
    );
    Ok(draft)
}

fn sku(
    config: &ListingConfig,
    color: &SpecRef,
    color_part: &str,
    size: Option<(&SpecRef, &String)>,
    price_cents: u64,
) -> SkuDraft {
    let mut specs = vec![color.clone()];
    specs.extend(size.map(|(s, _)| s.clone()));
    SkuDraft {
        size: size.map(|(s, _)| s.spec_name.clone()),
        specs,
        price_cents,
        stock: config.default_stock,
        out_sku_sn: sku_code(&[
            config.sku_prefix.as_str(),
            color_part,
            size.map(|(_, part)| part.as_str()).unwrap_or(""),
        ]),
    }
}

/// The ASCII form of a spec name for SKU codes. Names with no ASCII
/// letters or digits (`红色`) become `{tag}{position}` (`C1`, `S2`) so that
/// codes stay unique within the product.
fn code_part(name: &str, tag: char, index: usize) -> String {
    let ascii: String = name.chars().filter(char::is_ascii_alphanumeric).collect();
    if ascii.is_empty() {
        format!("{tag}{}", index + 1)
    } else {
        ascii
    }
}

/// Fill template properties from source attributes, then defaults, then
/// (optionally) the first allowed value. Returns fills and missing names.
fn fill_properties(
    product: &SourceProduct,
    template: &CategoryTemplate,
    config: &ListingConfig,
) -> (Vec<PropertyFill>, Vec<String>) {
    let mut fills = Vec::new();
    let mut missing = Vec::new();

    for prop in &template.properties {
        let from_source = lookup_ci(product.attributes.iter(), &prop.name);
        let from_defaults = lookup_ci(config.property_defaults.iter(), &prop.name);

        let fill = [from_source, from_defaults]
            .into_iter()
            .flatten()
            .find_map(|wanted| fill_value(prop, wanted))
            .or_else(|| {
                (prop.required && config.auto_fill_required)
                    .then(|| prop.values.first())
                    .flatten()
                    .map(|v| property_fill(prop, Some(v.vid), &v.value))
            });

        match fill {
            Some(f) => fills.push(f),
            None if prop.required => missing.push(prop.name.clone()),
            None => {}
        }
    }
    (fills, missing)
}

fn fill_value(prop: &TemplateProperty, wanted: &str) -> Option<PropertyFill> {
    if prop.is_free_text() {
        let wanted = wanted.trim();
        return (!wanted.is_empty()).then(|| property_fill(prop, None, wanted));
    }
    prop.match_value(wanted)
        .map(|v| property_fill(prop, Some(v.vid), &v.value))
}

fn property_fill(prop: &TemplateProperty, vid: Option<u64>, value: &str) -> PropertyFill {
    PropertyFill {
        template_pid: prop.template_pid,
        pid: prop.pid,
        ref_pid: prop.ref_pid,
        name: prop.name.clone(),
        vid,
        value: value.to_string(),
        value_unit: prop.value_unit.first().cloned().unwrap_or_default(),
    }
}

fn lookup_ci<'a, I>(mut entries: I, name: &str) -> Option<&'a str>
where
    I: Iterator<Item = (&'a String, &'a String)>,
{
    let name = name.trim().to_lowercase();
    entries
        .find(|(k, _)| k.trim().to_lowercase() == name)
        .map(|(_, v)| v.as_str())
}

/// `cents × multiplier`, rounded to the nearest cent.
pub fn apply_multiplier(cents: u64, multiplier: f64) -> u64 {
    (cents as f64 * multiplier).round().max(0.0) as u64
}

/// Join parts with `-`, keeping only `[A-Za-z0-9]` inside each part.
pub fn sku_code(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.chars().filter(char::is_ascii_alphanumeric).collect::<String>())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Collapse whitespace and cut at a word boundary within `max_chars`.
pub fn truncate_title(title: &str, max_chars: usize) -> String {
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.chars().count() <= max_chars {
        return title;
    }
    let cut: String = title.chars().take(max_chars).collect();
    match cut.rfind(' ') {
        Some(pos) if pos > 0 => cut[..pos].trim_end().to_string(),
        _ => cut,
    }
}

/// `12345` → `"123.45"`.
pub fn cents_to_decimal(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// `305` → `"30.5"`.
pub fn mm_to_cm(mm: u32) -> String {
    format!("{}.{}", mm / 10, mm % 10)
}

fn shipment_limit_secs(draft: &GoodsDraft) -> u64 {
    u64::from(draft.shipment_limit_days) * 86_400
}

/// Render the payload for whichever generation will receive it.
pub fn to_payload(draft: &GoodsDraft, generation: ApiGeneration) -> Value {
    match generation {
        ApiGeneration::New => to_goods_add(draft),
        ApiGeneration::Old => to_local_goods_add(draft),
    }
}

fn spec_json(spec: &SpecRef) -> Value {
    json!({
        "parentSpecId": spec.parent_spec_id,
        "parentSpecName": spec.parent_spec_name,
        "specId": spec.spec_id,
        "specName": spec.spec_name,
    })
}

/// Request body for `bg.goods.add`.
pub fn to_goods_add(draft: &GoodsDraft) -> Value {
    let properties: Vec<Value> = draft
        .properties
        .iter()
        .map(|p| {
            json!({
                "templatePid": p.template_pid,
                "pid": p.pid,
                "refPid": p.ref_pid,
                "propName": p.name,
                "vid": p.vid.unwrap_or(0),
                "propValue": p.value,
                "valueUnit": p.value_unit,
            })
        })
        .collect();

    let mut spec_props: Vec<Value> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for spec in draft.skus().flat_map(|s| s.specs.iter()) {
        if seen.insert(spec.spec_id) {
            spec_props.push(json!({
                "parentSpecId": spec.parent_spec_id,
                "parentSpecName": spec.parent_spec_name,
                "specId": spec.spec_id,
                "specName": spec.spec_name,
                "propName": spec.parent_spec_name,
                "propValue": spec.spec_name,
            }));
        }
    }

    let skcs: Vec<Value> = draft
        .skcs
        .iter()
        .map(|skc| {
            let skus: Vec<Value> = skc
                .skus
                .iter()
                .map(|sku| {
                    json!({
                        "thumbUrl": skc.images.first(),
                        "extCode": sku.out_sku_sn,
                        "supplierPrice": sku.price_cents,
                        "currencyType": draft.currency,
                        "productSkuSpecReqs": sku.specs.iter().map(spec_json).collect::<Vec<_>>(),
                        "productSkuStockQuantityReq": {
                            "warehouseStockQuantityReqs": [{ "targetStockAvailable": sku.stock }]
                        },
                        "productSkuWhExtAttrReq": {
                            "productSkuVolumeReq": {
                                "len": draft.package.length_mm,
                                "width": draft.package.width_mm,
                                "height": draft.package.height_mm,
                            },
                            "productSkuWeightReq": { "value": draft.package.weight_g },
                        },
                    })
                })
                .collect();
            json!({
                "previewImgUrls": skc.images,
                "colorImageUrl": skc.images.first(),
                "specIdList": [skc.color_spec.spec_id],
                "productSkuReqs": skus,
            })
        })
        .collect();

    json!({
        "catId": draft.cat_id,
        "productName": draft.title,
        "carouselImageUrls": draft.carousel_images,
        "materialImgUrl": draft.carousel_images.first(),
        "productI18nReqs": [{ "language": "en", "productName": draft.title }],
        "productPropertyReqs": properties,
        "productSpecPropertyReqs": spec_props,
        "productSkcReqs": skcs,
        "productWhExtAttrReq": {
            "outerGoodsUrl": draft.source_url,
            "productOrigin": { "countryShortName": "CN" },
        },
        "productShipmentReq": { "shipmentLimitSecond": shipment_limit_secs(draft) },
        "productOuterPackageReq": {
            "packageShape": 1,
            "packageType": 0,
        },
    })
}

/// Request body for `bg.local.goods.add`.
pub fn to_local_goods_add(draft: &GoodsDraft) -> Value {
    let properties: Vec<Value> = draft
        .properties
        .iter()
        .map(|p| {
            json!({
                "templatePid": p.template_pid,
                "pid": p.pid,
                "refPid": p.ref_pid,
                "vid": p.vid.unwrap_or(0),
                "value": p.value,
                "valueUnit": p.value_unit,
            })
        })
        .collect();

    let gallery: Vec<Value> = draft
        .carousel_images
        .iter()
        .enumerate()
        .map(|(i, url)| json!({ "galleryType": 1, "sort": i + 1, "url": url }))
        .collect();

    let skus: Vec<Value> = draft
        .skcs
        .iter()
        .flat_map(|skc| skc.skus.iter().map(move |sku| (skc, sku)))
        .map(|(skc, sku)| {
            json!({
                "outSkuSn": sku.out_sku_sn,
                "specIdList": sku.specs.iter().map(|s| s.spec_id).collect::<Vec<_>>(),
                "price": {
                    "basePrice": {
                        "amount": cents_to_decimal(sku.price_cents),
                        "currency": draft.currency,
                    }
                },
                "quantity": sku.stock,
                "images": skc.images.first().map(|u| vec![u.clone()]).unwrap_or_default(),
                "weight": draft.package.weight_g.to_string(),
                "weightUnit": "g",
                "length": mm_to_cm(draft.package.length_mm),
                "width": mm_to_cm(draft.package.width_mm),
                "height": mm_to_cm(draft.package.height_mm),
                "volumeUnit": "cm",
            })
        })
        .collect();

    json!({
        "goodsBasic": {
            "goodsName": draft.title,
            "catId": draft.cat_id,
            "outGoodsSn": draft.out_goods_sn,
            "goodsDesc": draft.description,
        },
        "goodsServicePromise": {
            "shipmentLimitSecond": shipment_limit_secs(draft),
            "fulfillmentType": 1,
        },
        "goodsProperty": { "goodsProperties": properties },
        "goodsGalleryList": gallery,
        "skuList": skus,
        "goodsOriginInfo": { "originRegionName1": "Mainland China", "outerGoodsUrl": draft.source_url },
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::types::{PropertyValue, COLOR_PARENT_SPEC_ID, SIZE_PARENT_SPEC_ID};
    use std::collections::BTreeMap;

    fn spec(parent: u64, id: u64, name: &str) -> SpecRef {
        SpecRef {
            parent_spec_id: parent,
            parent_spec_name: if parent == COLOR_PARENT_SPEC_ID { "Color" } else { "Size" }.into(),
            spec_id: id,
            spec_name: name.into(),
        }
    }

    fn template() -> CategoryTemplate {
        CategoryTemplate {
            cat_id: 30_001,
            properties: vec![
                TemplateProperty {
                    template_pid: 11,
                    pid: 1,
                    ref_pid: 101,
                    name: "Material".into(),
                    required: true,
                    values: vec![
                        PropertyValue { vid: 500, value: "Cotton".into() },
                        PropertyValue { vid: 501, value: "Polyester".into() },
                    ],
                    value_unit: vec![],
                },
                TemplateProperty {
                    template_pid: 12,
                    pid: 2,
                    ref_pid: 102,
                    name: "Style".into(),
                    required: false,
                    values: vec![PropertyValue { vid: 600, value: "Casual".into() }],
                    value_unit: vec![],
                },
            ],
            parent_specs: vec![],
        }
    }

    fn product() -> SourceProduct {
        SourceProduct {
            url: "https://shop.example/item/1".into(),
            title: "  Summer   Cotton Tee ".into(),
            description: "Soft tee".into(),
            price_cents: Some(1_000),
            currency: None,
            images: vec![],
            sizes: vec!["M".into(), "L".into()],
            colors: vec!["White".into()],
            attributes: BTreeMap::from([("material".to_string(), "cotton".to_string())]),
            sku: Some("A-100".into()),
        }
    }

    fn specs() -> ResolvedSpecs {
        ResolvedSpecs {
            colors: vec![spec(COLOR_PARENT_SPEC_ID, 9_001, "White")],
            sizes: vec![
                spec(SIZE_PARENT_SPEC_ID, 9_101, "M"),
                spec(SIZE_PARENT_SPEC_ID, 9_102, "L"),
            ],
        }
    }

    fn images() -> Vec<String> {
        (1..=3).map(|i| format!("https://img.temu/{i}.jpg")).collect()
    }

    /// A complete draft shared by API tests.
    pub(crate) fn sample_draft() -> GoodsDraft {
        let config = ListingConfig::builder().price_multiplier(1.5).build().unwrap();
        build_draft(&product(), &template(), &specs(), &images(), &config).unwrap()
    }

    #[test]
    fn draft_has_one_sku_per_size() {
        let draft = sample_draft();
        assert_eq!(draft.title, "Summer Cotton Tee");
        assert_eq!(draft.cat_id, 30_001);
        assert_eq!(draft.skcs.len(), 1);
        assert_eq!(draft.sku_count(), 2);
        let sku = &draft.skcs[0].skus[1];
        assert_eq!(sku.price_cents, 1_500);
        assert_eq!(sku.out_sku_sn, "TL-White-L");
        assert_eq!(sku.specs.iter().map(|s| s.spec_id).collect::<Vec<_>>(), vec![9_001, 9_102]);
        assert_eq!(draft.out_goods_sn, "TL-A100");
        assert_eq!(draft.currency, "CNY");
    }

    #[test]
    fn properties_fill_from_source_case_insensitively() {
        let draft = sample_draft();
        assert_eq!(draft.properties.len(), 1, "optional Style has no source value");
        assert_eq!(draft.properties[0].vid, Some(500));
        assert_eq!(draft.properties[0].value, "Cotton");
        assert!(draft.missing_properties.is_empty());
    }

    #[test]
    fn missing_required_property_is_an_error_outside_dry_run() {
        let mut p = product();
        p.attributes.clear();
        let config = ListingConfig::default();
        let err = build_draft(&p, &template(), &specs(), &images(), &config).unwrap_err();
        assert!(matches!(err, ListingError::MissingRequiredProperty { ref name } if name == "Material"));

        let dry = ListingConfig::builder().dry_run(true).build().unwrap();
        let draft = build_draft(&p, &template(), &specs(), &images(), &dry).unwrap();
        assert_eq!(draft.missing_properties, vec!["Material"]);
    }

    #[test]
    fn defaults_and_auto_fill() {
        let mut p = product();
        p.attributes.clear();

        let config = ListingConfig::builder()
            .property_default("MATERIAL", "Polyester")
            .build()
            .unwrap();
        let draft = build_draft(&p, &template(), &specs(), &images(), &config).unwrap();
        assert_eq!(draft.properties[0].vid, Some(501));

        let config = ListingConfig::builder().auto_fill_required(true).build().unwrap();
        let draft = build_draft(&p, &template(), &specs(), &images(), &config).unwrap();
        assert_eq!(draft.properties[0].vid, Some(500));
    }

    #[test]
    fn no_sizes_gives_one_sku_per_color() {
        let specs = ResolvedSpecs {
            colors: specs().colors,
            sizes: vec![],
        };
        let draft =
            build_draft(&product(), &template(), &specs, &images(), &ListingConfig::default()).unwrap();
        assert_eq!(draft.sku_count(), 1);
        assert_eq!(draft.skcs[0].skus[0].out_sku_sn, "TL-White");
        assert_eq!(draft.skcs[0].skus[0].size, None);
    }

    #[test]
    fn chinese_color_names_keep_sku_codes_unique() {
        let specs = ResolvedSpecs {
            colors: vec![
                spec(COLOR_PARENT_SPEC_ID, 9_001, "红色"),
                spec(COLOR_PARENT_SPEC_ID, 9_002, "蓝色"),
            ],
            sizes: vec![spec(SIZE_PARENT_SPEC_ID, 9_101, "M")],
        };
        let draft =
            build_draft(&product(), &template(), &specs, &images(), &ListingConfig::default()).unwrap();
        let codes: Vec<_> = draft.skus().map(|s| s.out_sku_sn.as_str()).collect();
        assert_eq!(codes, vec!["TL-C1-M", "TL-C2-M"]);
        assert_eq!(draft.skcs[0].color, "红色");
    }

    #[test]
    fn helpers() {
        assert_eq!(apply_multiplier(999, 1.35), 1_349);
        assert_eq!(apply_multiplier(1_000, 1.0), 1_000);
        assert_eq!(sku_code(&["TL", "Light Blue", "2XL"]), "TL-LightBlue-2XL");
        assert_eq!(sku_code(&["TL", "", "M"]), "TL-M");
        assert_eq!(code_part("Light Blue", 'C', 0), "LightBlue");
        assert_eq!(code_part("红色", 'C', 1), "C2");
        assert_eq!(cents_to_decimal(5_990), "59.90");
        assert_eq!(cents_to_decimal(7), "0.07");
        assert_eq!(mm_to_cm(305), "30.5");
        assert_eq!(truncate_title("one two three", 9), "one two");
        assert_eq!(truncate_title("abcdefghij", 4), "abcd");
    }

    #[test]
    fn new_payload_shape() {
        let body = to_goods_add(&sample_draft());
        assert_eq!(body["catId"], 30_001);
        assert_eq!(body["productName"], "Summer Cotton Tee");
        assert_eq!(body["materialImgUrl"], "https://img.temu/1.jpg");
        assert_eq!(body["carouselImageUrls"].as_array().unwrap().len(), 3);
        assert_eq!(body["productPropertyReqs"][0]["vid"], 500);
        assert_eq!(body["productSpecPropertyReqs"].as_array().unwrap().len(), 3);
        let sku = &body["productSkcReqs"][0]["productSkuReqs"][0];
        assert_eq!(sku["supplierPrice"], 1_500);
        assert_eq!(sku["productSkuSpecReqs"][1]["specName"], "M");
        assert_eq!(body["productWhExtAttrReq"]["outerGoodsUrl"], "https://shop.example/item/1");
        assert_eq!(body["productI18nReqs"][0]["productName"], "Summer Cotton Tee");
    }

    #[test]
    fn old_payload_shape() {
        let body = to_local_goods_add(&sample_draft());
        assert_eq!(body["goodsBasic"]["goodsName"], "Summer Cotton Tee");
        assert_eq!(body["goodsBasic"]["catId"], 30_001);
        assert_eq!(body["goodsProperty"]["goodsProperties"][0]["vid"], 500);
        assert_eq!(body["goodsGalleryList"].as_array().unwrap().len(), 3);
        let sku = &body["skuList"][0];
        assert_eq!(sku["price"]["basePrice"]["amount"], "15.00");
        assert_eq!(sku["price"]["basePrice"]["currency"], "CNY");
        assert_eq!(sku["specIdList"], json!([9_001, 9_101]));
        assert_eq!(sku["weightUnit"], "g");
        assert_eq!(sku["length"], "30.0");
        assert_eq!(
            body["goodsServicePromise"]["shipmentLimitSecond"],
            2 * 86_400
        );
    }
}
