//! MD5 helpers for the two places the WifiDog flow needs a digest: the
//! access token derived from an order number, and the WeChat portal sign.

/// Lower-case hex MD5 of `seed`
pub fn md5_hex(seed: &str) -> String {
    format!("{:x}", md5::compute(seed.as_bytes()))
}

/// Access token for an order. Deterministic: the same order number always
/// yields the same token.
pub fn derive_token(order_number: &str) -> String {
    md5_hex(order_number)
}

/// Fields the WeChat portal signs, in signing order.
#[derive(Debug, Clone)]
pub struct WeixinSignFields<'a> {
    pub app_id: &'a str,
    pub extend: &'a str,
    pub timestamp: i64,
    pub shop_id: &'a str,
    pub auth_url: &'a str,
    pub mac: &'a str,
    pub ssid: &'a str,
    pub bssid: &'a str,
    pub secret_key: &'a str,
}

/// `md5(appId + extend + timestamp + shopId + authUrl + mac + ssid + bssid + secretKey)`
pub fn weixin_sign(fields: &WeixinSignFields<'_>) -> String {
    let plain = format!(
        "{}{}{}{}{}{}{}{}{}",
        fields.app_id,
        fields.extend,
        fields.timestamp,
        fields.shop_id,
        fields.auth_url,
        fields.mac,
        fields.ssid,
        fields.bssid,
        fields.secret_key
    );
    md5_hex(&plain)
}
