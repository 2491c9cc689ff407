//! 活动消息模板
//!
//! 模板使用单花括号占位符，例如：
//!
//! ```ignore
//! let ctx = TemplateContext::new()
//!     .with("nombre", "Ana")
//!     .with("faltan", 2);
//! render("Hola {nombre}, te faltan {faltan} sellos", &ctx);
//! // "Hola Ana, te faltan 2 sellos"
//! ```
//!
//! 支持的变量：`{nombre}` `{sellos}` `{meta}` `{faltan}` `{negocio}`
//! `{recompensa}` `{premios}` `{dias}`。未知变量或缺少取值时保留原样。

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::debug;

use crate::models::{Business, Customer};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("placeholder regex"));

/// 已知的模板变量
pub const TEMPLATE_VARIABLES: [&str; 8] = [
    "nombre",
    "sellos",
    "meta",
    "faltan",
    "negocio",
    "recompensa",
    "premios",
    "dias",
];

/// 模板渲染上下文
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    values: HashMap<&'static str, String>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置变量，未知变量名会被忽略
    pub fn with(mut self, name: &str, value: impl ToString) -> Self {
        if let Some(known) = TEMPLATE_VARIABLES.iter().find(|v| **v == name) {
            self.values.insert(*known, value.to_string());
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// 由客户与商户当前状态构建
    ///
    /// `dias` 只有在客户集过章时才有值
    pub fn for_customer(customer: &Customer, business: &Business, now: DateTime<Utc>) -> Self {
        let mut ctx = Self::new()
            .with("sellos", customer.stamps_count)
            .with("meta", business.reward_threshold)
            .with("faltan", customer.stamps_remaining(business.reward_threshold))
            .with("negocio", &business.name)
            .with("recompensa", &business.reward_description)
            .with("premios", customer.total_rewards_earned);

        if let Some(name) = customer.name.as_deref().filter(|n| !n.trim().is_empty()) {
            ctx = ctx.with("nombre", name);
        }
        if let Some(days) = customer.days_since_last_stamp(now) {
            ctx = ctx.with("dias", days);
        }
        ctx
    }
}

/// 渲染模板
pub fn render(template: &str, ctx: &TemplateContext) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            match ctx.get(name) {
                Some(value) => value.to_string(),
                None => {
                    debug!(variable = name, "模板变量无取值，保留原样");
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn business() -> Business {
        Business {
            id: 1,
            name: "Café Luna".to_string(),
            reward_threshold: 10,
            reward_description: "un café gratis".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn customer(name: Option<&str>) -> Customer {
        Customer {
            id: 7,
            business_id: 1,
            name: name.map(String::from),
            phone: Some("+5215550001".to_string()),
            stamps_count: 8,
            total_rewards_earned: 2,
            last_stamp_at: Some(Utc::now() - Duration::days(3)),
            enrolled_at: Utc::now(),
            version: 0,
        }
    }

    #[test]
    fn test_render_all_variables() {
        let ctx = TemplateContext::for_customer(&customer(Some("Ana")), &business(), Utc::now());
        let out = render(
            "{nombre}: {sellos}/{meta}, faltan {faltan} para {recompensa} en {negocio}. Premios {premios}, {dias} días",
            &ctx,
        );
        assert_eq!(
            out,
            "Ana: 8/10, faltan 2 para un café gratis en Café Luna. Premios 2, 3 días"
        );
    }

    #[test]
    fn test_missing_value_keeps_placeholder() {
        let ctx = TemplateContext::for_customer(&customer(None), &business(), Utc::now());
        assert_eq!(render("Hola {nombre}!", &ctx), "Hola {nombre}!");
    }

    #[test]
    fn test_unknown_variable_keeps_placeholder() {
        let ctx = TemplateContext::new().with("cumple", "hoy").with("sellos", 3);
        assert!(ctx.get("cumple").is_none());
        assert_eq!(render("{cumple} {sellos}", &ctx), "{cumple} 3");
    }

    #[test]
    fn test_no_placeholders() {
        assert_eq!(render("Gracias por tu visita", &TemplateContext::new()), "Gracias por tu visita");
    }
}
