use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;

use crate::{
    error::{AppError, Result},
    infrastructure::db::entities::{franchisee, order, product_size},
    services::printer::settings::PrinterSettings,
};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const FALLBACK_WIDTH_CM: f64 = 21.0;
const FALLBACK_HEIGHT_CM: f64 = 29.7;
const FALLBACK_DPI: i32 = 300;

#[derive(Debug, Clone, Serialize)]
pub struct ShippingReceiver {
    pub name: String,
    pub mobile: String,
    pub province: String,
    pub city: String,
    pub city_part: String,
    pub street: String,
    pub corp_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Photo {
    pub page_type: i32,
    pub index: i32,
    pub num: i32,
    pub file_name: String,
    pub width: f64,
    pub height: f64,
    pub dpi: i32,
    pub pix_width: i64,
    pub pix_height: i64,
    pub file_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubOrder {
    pub sub_order_id: String,
    pub customer_name: String,
    pub product_id: String,
    pub product_name: String,
    pub shop_product_sn: String,
    pub remark: String,
    pub num: i32,
    pub photos: Vec<Photo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrintOrder {
    pub source_app_id: String,
    pub order_id: String,
    pub order_no: String,
    pub order_time: String,
    pub push_time: String,
    pub remark: String,
    pub shop_id: String,
    pub shop_name: String,
    pub shipping_receiver: ShippingReceiver,
    pub sub_orders: Vec<SubOrder>,
}

/// Receiver from the stored address: structured JSON when possible, raw text otherwise.
pub fn shipping_receiver(order: &order::Model) -> ShippingReceiver {
    let mut receiver = ShippingReceiver {
        name: order.customer_name.clone(),
        mobile: order.customer_phone.clone(),
        province: String::new(),
        city: String::new(),
        city_part: String::new(),
        street: String::new(),
        corp_name: String::new(),
    };

    let Some(address) = order.customer_address.as_deref().map(str::trim) else {
        return receiver;
    };

    match serde_json::from_str::<Value>(address) {
        Ok(Value::Object(fields)) => {
            let text = |key: &str| {
                fields
                    .get(key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
            };

            if let Some(name) = text("receiver") {
                receiver.name = name;
            }
            if let Some(phone) = text("phone") {
                receiver.mobile = phone;
            }
            if let Some(full_address) = text("fullAddress") {
                receiver.street = full_address;
            }
        }
        _ => receiver.street = address.to_string(),
    }

    receiver
}

/// Image the print house should produce: the HD render, else the retouched final.
pub fn print_image(order: &order::Model) -> Option<&str> {
    [&order.hd_image, &order.final_image, &order.original_image]
        .into_iter()
        .find_map(|path| path.as_deref().filter(|path| !path.trim().is_empty()))
}

pub fn file_url(media_base_url: &str, image_path: &str) -> Result<String> {
    if image_path.starts_with("http://") || image_path.starts_with("https://") {
        return Ok(image_path.to_string());
    }

    let file_name = image_path.rsplit('/').next().unwrap_or(image_path);
    let directory: &[&str] = if file_name.contains("hd_") {
        &["public", "hd"]
    } else if file_name.contains("final_") {
        &["media", "final"]
    } else {
        &["media", "original"]
    };

    let mut url = Url::parse(media_base_url)
        .map_err(|e| AppError::InvalidParams(format!("Invalid media base url: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| AppError::InvalidParams("Media base url cannot carry a path".into()))?
        .pop_if_empty()
        .extend(directory)
        .push(file_name);

    Ok(url.to_string())
}

fn pixels(cm: f64, dpi: i32) -> i64 {
    (cm / 2.54 * dpi as f64).round() as i64
}

pub fn build(
    order: &order::Model,
    settings: &PrinterSettings,
    franchisee: Option<&franchisee::Model>,
    size: Option<&product_size::Model>,
    pushed_at: DateTime<Utc>,
) -> Result<PrintOrder> {
    let image_path = print_image(order).ok_or_else(|| {
        AppError::InvalidParams(format!("Order {} has no printable image", order.id))
    })?;
    let file_name = image_path
        .rsplit('/')
        .next()
        .unwrap_or(image_path)
        .to_string();

    let (width, height, dpi) = size
        .map(|size| (size.width_cm, size.height_cm, size.dpi))
        .unwrap_or((FALLBACK_WIDTH_CM, FALLBACK_HEIGHT_CM, FALLBACK_DPI));

    let (product_id, product_name) = match size {
        Some(size) => (
            size.printer_product_id.clone(),
            size.printer_product_name.clone(),
        ),
        None => (
            settings.default_product_id.clone(),
            order
                .size
                .as_deref()
                .map(|size| format!("Custom print {size}"))
                .unwrap_or_else(|| "Custom print".to_string()),
        ),
    };

    let shop_id = franchisee
        .and_then(|franchisee| franchisee.printer_shop_id.clone())
        .unwrap_or_else(|| settings.shop_id.clone());
    let shop_name = franchisee
        .and_then(|franchisee| franchisee.printer_shop_name.clone())
        .unwrap_or_else(|| settings.shop_name.clone());

    let photo = Photo {
        page_type: 0,
        index: 1,
        num: 1,
        file_url: file_url(&settings.media_base_url, image_path)?,
        file_name,
        width,
        height,
        dpi,
        pix_width: pixels(width, dpi),
        pix_height: pixels(height, dpi),
    };

    Ok(PrintOrder {
        source_app_id: settings.source_app_id.clone(),
        order_id: order.external_key(),
        order_no: order.order_number.clone(),
        order_time: order.created_at.format(TIME_FORMAT).to_string(),
        push_time: pushed_at.format(TIME_FORMAT).to_string(),
        remark: String::new(),
        shop_id,
        shop_name,
        shipping_receiver: shipping_receiver(order),
        sub_orders: vec![SubOrder {
            sub_order_id: format!("{}_1", order.order_number),
            customer_name: order.customer_name.clone(),
            product_id,
            product_name,
            shop_product_sn: order.order_number.clone(),
            remark: String::new(),
            num: 1,
            photos: vec![photo],
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_urls_follow_image_kind() {
        let base = "https://media.example.com";
        assert_eq!(
            file_url(base, "/uploads/hd_PET1.png").unwrap(),
            "https://media.example.com/public/hd/hd_PET1.png"
        );
        assert_eq!(
            file_url(base, "final_PET1.jpg").unwrap(),
            "https://media.example.com/media/final/final_PET1.jpg"
        );
        assert_eq!(
            file_url("https://media.example.com/", "cat photo.jpg").unwrap(),
            "https://media.example.com/media/original/cat%20photo.jpg"
        );
        assert_eq!(
            file_url(base, "https://cdn.example.com/x.png").unwrap(),
            "https://cdn.example.com/x.png"
        );
    }

    #[test]
    fn pixel_sizes_round_from_centimetres() {
        assert_eq!(pixels(21.0, 300), 2480);
        assert_eq!(pixels(29.7, 300), 3508);
    }
}
