// Login page
//
// Server-rendered HTML listing the enabled channel entry points.

use wifiauth_core::digest::{weixin_sign, WeixinSignFields};
use wifiauth_core::{GatewaySetting, Order, PortalConfig};

/// WeChat portal parameters embedded in the page
#[derive(Debug, Clone, PartialEq)]
pub struct WeixinPortal {
    pub app_id: String,
    pub extend: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub sign: String,
    pub shop_id: String,
    pub auth_url: String,
    pub mac: String,
    pub ssid: String,
    pub bssid: String,
}

impl WeixinPortal {
    pub fn new(
        portal: &PortalConfig,
        setting: &GatewaySetting,
        order: &Order,
        ssid: &str,
        timestamp: i64,
    ) -> Self {
        let auth_url = portal.wx_auth_url();
        // the client MAC doubles as bssid
        let sign = weixin_sign(&WeixinSignFields {
            app_id: &setting.weixin.app_id,
            extend: &order.order_number,
            timestamp,
            shop_id: &setting.weixin.shop_id,
            auth_url: &auth_url,
            mac: &order.sta_mac,
            ssid,
            bssid: &order.sta_mac,
            secret_key: &setting.weixin.secret_key,
        });
        Self {
            app_id: setting.weixin.app_id.clone(),
            extend: order.order_number.clone(),
            timestamp,
            sign,
            shop_id: setting.weixin.shop_id.clone(),
            auth_url,
            mac: order.sta_mac.clone(),
            ssid: ssid.to_string(),
            bssid: order.sta_mac.clone(),
        }
    }
}

/// Everything the login page shows
#[derive(Debug, Clone)]
pub struct LoginPage {
    pub auth_server: String,
    pub order_number: String,
    pub gw_address: String,
    pub gw_port: u16,
    pub wfc_enable: bool,
    pub wfc_auth_url: String,
    pub wfc_amount: f64,
    pub duration_hours: f64,
    pub weixin_enable: bool,
    pub weixin: WeixinPortal,
    pub sms_ali_enable: bool,
    pub sms_wy_enable: bool,
    pub user_enable: bool,
}

impl LoginPage {
    pub fn new(
        portal: &PortalConfig,
        setting: &GatewaySetting,
        order: &Order,
        ssid: &str,
        timestamp_ms: i64,
    ) -> Self {
        let wfc_amount = wifiauth_channels::wfc::to_coins(order.to_amount);
        Self {
            auth_server: portal.auth_domain.clone(),
            order_number: order.order_number.clone(),
            gw_address: order.gw_address.clone(),
            gw_port: order.gw_port,
            wfc_enable: setting.wificoin.enable,
            wfc_auth_url: portal.wfc_auth_url(
                &order.order_number,
                &setting.wificoin.to_address,
                wfc_amount,
            ),
            wfc_amount,
            duration_hours: setting.duration_hours(),
            weixin_enable: setting.weixin.enable,
            weixin: WeixinPortal::new(portal, setting, order, ssid, timestamp_ms),
            sms_ali_enable: setting.sms.ali_enable,
            sms_wy_enable: setting.sms.wy_enable,
            user_enable: setting.user.enable,
        }
    }

    pub fn render(&self) -> String {
        let mut sections = Vec::new();
        let order = escape(&self.order_number);
        let server = escape(&self.auth_server);

        if self.wfc_enable {
            sections.push(format!(
                r#"<section id="wfc"><h2>WiFiCoin</h2>
<p>Pay {} WFC for {} hour(s) of access.</p>
<a class="button" href="{}">Pay with WiFiCoin</a></section>"#,
                self.wfc_amount,
                self.duration_hours,
                escape(&self.wfc_auth_url)
            ));
        }

        if self.weixin_enable {
            let wx = &self.weixin;
            sections.push(format!(
                r#"<section id="weixin"><h2>WeChat</h2>
<button id="wx-connect" data-app-id="{}" data-extend="{}" data-timestamp="{}" data-sign="{}" data-shop-id="{}" data-auth-url="{}" data-mac="{}" data-ssid="{}" data-bssid="{}">Connect with WeChat</button></section>"#,
                escape(&wx.app_id),
                escape(&wx.extend),
                wx.timestamp,
                escape(&wx.sign),
                escape(&wx.shop_id),
                escape(&wx.auth_url),
                escape(&wx.mac),
                escape(&wx.ssid),
                escape(&wx.bssid)
            ));
        }

        if self.sms_ali_enable || self.sms_wy_enable {
            sections.push(format!(
                r#"<section id="sms"><h2>SMS</h2>
<form id="sms-send" method="get" action="{server}/wifidog/auth/sms">
<input type="hidden" name="orderNumber" value="{order}">
<input type="tel" name="phoneNumber" placeholder="Phone number">
<button type="submit">Send code</button></form>
<form id="sms-check" method="get" action="{server}/wifidog/auth/sms/check">
<input type="hidden" name="orderNumber" value="{order}">
<input type="tel" name="phoneNumber" placeholder="Phone number">
<input type="text" name="checkCode" placeholder="Code">
<button type="submit">Verify</button></form></section>"#,
            ));
        }

        if self.user_enable {
            sections.push(format!(
                r#"<section id="user"><h2>Account</h2>
<form id="user-login" method="get" action="{server}/wifidog/auth/user">
<input type="hidden" name="orderNumber" value="{order}">
<input type="text" name="user" placeholder="User">
<input type="password" name="password" placeholder="Password">
<button type="submit">Sign in</button></form></section>"#,
            ));
        }

        if sections.is_empty() {
            sections.push("<p>No login method is enabled for this network.</p>".to_string());
        }

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width, initial-scale=1"><title>Wi-Fi Login</title></head>
<body data-gw-address="{}" data-gw-port="{}">
<h1>Wi-Fi Login</h1>
{}
</body>
</html>"#,
            escape(&self.gw_address),
            self.gw_port,
            sections.join("\n")
        )
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wifiauth_core::digest::md5_hex;

    fn order() -> Order {
        Order {
            order_number: "o1".to_string(),
            order_time: 0,
            to_amount: 1_234_567,
            gw_address: "10.0.0.1".to_string(),
            gw_port: 2060,
            gw_id: "GW1".to_string(),
            sta_mac: "AA".to_string(),
        }
    }

    fn setting() -> GatewaySetting {
        let mut setting = GatewaySetting::new("GW1");
        setting.duration = 7200;
        setting.wificoin.enable = true;
        setting.wificoin.to_address = "wAddr".to_string();
        setting.weixin.app_id = "app".to_string();
        setting.weixin.shop_id = "shop".to_string();
        setting.weixin.secret_key = "key".to_string();
        setting
    }

    #[test]
    fn weixin_sign_uses_mac_as_bssid() {
        let portal = PortalConfig::default();
        let wx = WeixinPortal::new(&portal, &setting(), &order(), "cafe", 1000);
        let expected = md5_hex(&format!(
            "appo11000shop{}AAcafeAAkey",
            portal.wx_auth_url()
        ));
        assert_eq!(wx.sign, expected);
        assert_eq!(wx.bssid, "AA");
    }

    #[test]
    fn page_shows_amount_and_duration_for_enabled_channels() {
        let page = LoginPage::new(&PortalConfig::default(), &setting(), &order(), "", 0);
        assert_eq!(page.wfc_amount, 1.234567);
        assert_eq!(page.duration_hours, 2.0);

        let html = page.render();
        assert!(html.contains("Pay 1.234567 WFC for 2 hour(s)"));
        assert!(html.contains("orderNumber=o1"));
        assert!(!html.contains(r#"id="weixin""#));
        assert!(!html.contains(r#"id="sms""#));
    }

    #[test]
    fn escape_handles_markup() {
        assert_eq!(escape(r#"<a href="x">&</a>"#), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }
}
