//! Checkout step validation.

use serde::Deserialize;

use shopfront_core::{DistrictId, PaymentMethod, ProvinceId};

use crate::api::ShippingAddress;
use crate::services::validation::{self, FieldErrors, non_blank};

/// Shipping step form, as posted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ShippingForm {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub address_line: String,
    pub province_id: String,
    pub district_id: String,
    pub ward_code: String,
    pub note: String,
}

impl ShippingForm {
    /// Prefill from an address already entered.
    #[must_use]
    pub fn from_address(address: &ShippingAddress, note: Option<&str>) -> Self {
        Self {
            full_name: address.full_name.clone(),
            phone: address.phone.clone(),
            email: address.email.clone().unwrap_or_default(),
            address_line: address.address_line.clone(),
            province_id: address.province_id.map(|id| id.to_string()).unwrap_or_default(),
            district_id: address.district_id.map(|id| id.to_string()).unwrap_or_default(),
            ward_code: address.ward_code.clone(),
            note: note.unwrap_or_default().to_string(),
        }
    }
}

/// Payment step form, as posted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PaymentForm {
    pub payment_method: String,
    pub wallet_provider: String,
}

/// Validate the shipping step.
///
/// Province, district and ward names are left empty; they are filled in
/// from the shipping lookups once the ids are known to be valid.
///
/// # Errors
///
/// Returns one error per invalid field.
pub fn validate_shipping(form: &ShippingForm) -> Result<ShippingAddress, FieldErrors> {
    let mut errors = FieldErrors::new();
    validation::require(&mut errors, "full_name", &form.full_name, "Full name");
    validation::require(&mut errors, "phone", &form.phone, "Phone number");
    validation::phone(&mut errors, "phone", &form.phone);
    validation::email(&mut errors, "email", &form.email);
    validation::require(&mut errors, "address_line", &form.address_line, "Address");
    validation::require(&mut errors, "ward_code", &form.ward_code, "Ward");

    let province_id = parse_id::<ProvinceId>(&mut errors, "province_id", &form.province_id, "Province");
    let district_id = parse_id::<DistrictId>(&mut errors, "district_id", &form.district_id, "District");

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ShippingAddress {
        full_name: form.full_name.trim().to_string(),
        phone: form.phone.trim().to_string(),
        email: non_blank(&form.email),
        address_line: form.address_line.trim().to_string(),
        province_id,
        district_id,
        ward_code: form.ward_code.trim().to_string(),
        ..ShippingAddress::default()
    })
}

/// Validate the payment step.
///
/// # Errors
///
/// Returns one error per invalid field.
pub fn validate_payment(form: &PaymentForm) -> Result<(PaymentMethod, Option<String>), FieldErrors> {
    let mut errors = FieldErrors::new();

    let method = if form.payment_method.trim().is_empty() {
        errors.insert("payment_method", "Choose a payment method".to_string());
        None
    } else if let Ok(method) = form.payment_method.parse::<PaymentMethod>() {
        Some(method)
    } else {
        errors.insert("payment_method", "Choose a valid payment method".to_string());
        None
    };

    let wallet = non_blank(&form.wallet_provider);
    if method == Some(PaymentMethod::EWallet) && wallet.is_none() {
        errors.insert("wallet_provider", "Choose an e-wallet provider".to_string());
    }

    match method {
        Some(method) if errors.is_empty() => {
            let wallet = (method == PaymentMethod::EWallet).then_some(wallet).flatten();
            Ok((method, wallet))
        }
        _ => Err(errors),
    }
}

fn parse_id<T: std::str::FromStr>(
    errors: &mut FieldErrors,
    field: &'static str,
    value: &str,
    label: &str,
) -> Option<T> {
    let value = value.trim();
    if value.is_empty() {
        errors.insert(field, format!("{label} is required"));
        return None;
    }
    let parsed = value.parse().ok();
    if parsed.is_none() {
        errors.insert(field, format!("Choose a valid {}", label.to_lowercase()));
    }
    parsed
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn complete() -> ShippingForm {
        ShippingForm {
            full_name: "Nguyen Van A".into(),
            phone: "0912345678".into(),
            email: String::new(),
            address_line: "12 Ly Thuong Kiet".into(),
            province_id: "1".into(),
            district_id: "21".into(),
            ward_code: "00031".into(),
            note: String::new(),
        }
    }

    #[test]
    fn complete_shipping_form_is_accepted() {
        let address = validate_shipping(&complete()).unwrap();
        assert_eq!(address.province_id, Some(ProvinceId::new(1)));
        assert_eq!(address.email, None);
    }

    #[test]
    fn each_required_field_is_reported_alone() {
        let cases: [(&str, fn(&mut ShippingForm)); 6] = [
            ("full_name", |f| f.full_name.clear()),
            ("phone", |f| f.phone.clear()),
            ("address_line", |f| f.address_line = "   ".into()),
            ("province_id", |f| f.province_id.clear()),
            ("district_id", |f| f.district_id.clear()),
            ("ward_code", |f| f.ward_code.clear()),
        ];
        for (field, blank) in cases {
            let mut form = complete();
            blank(&mut form);
            let errors = validate_shipping(&form).unwrap_err();
            assert_eq!(errors.keys().copied().collect::<Vec<_>>(), vec![field]);
        }
    }

    #[test]
    fn optional_email_must_be_valid_when_present() {
        let mut form = complete();
        form.email = "buyer@".into();
        let errors = validate_shipping(&form).unwrap_err();
        assert!(errors.contains_key("email"));
    }

    #[test]
    fn e_wallet_needs_a_provider() {
        let form = PaymentForm {
            payment_method: "E_WALLET".into(),
            wallet_provider: String::new(),
        };
        let errors = validate_payment(&form).unwrap_err();
        assert!(errors.contains_key("wallet_provider"));

        let form = PaymentForm {
            payment_method: "E_WALLET".into(),
            wallet_provider: "MoMo".into(),
        };
        assert_eq!(
            validate_payment(&form).unwrap(),
            (PaymentMethod::EWallet, Some("MoMo".into()))
        );
    }

    #[test]
    fn wallet_provider_is_dropped_for_other_methods() {
        let form = PaymentForm {
            payment_method: "COD".into(),
            wallet_provider: "MoMo".into(),
        };
        assert_eq!(validate_payment(&form).unwrap(), (PaymentMethod::Cod, None));
    }

    #[test]
    fn unknown_payment_method_is_rejected() {
        let form = PaymentForm {
            payment_method: "CRYPTO".into(),
            wallet_provider: String::new(),
        };
        assert!(validate_payment(&form).unwrap_err().contains_key("payment_method"));
    }
}
