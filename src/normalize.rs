//! Normalización de filas crudas del CSV a registros tipados.
//!
//! La coerción nunca falla la carga: un valor ilegible se convierte en
//! ausente, pero queda señalado como descartado para que el cargador pueda
//! registrarlo y contarlo en su resumen.

use crate::models::{PhoneRecord, RawPhoneRow};

/// Tipo de cambio fijo aplicado al precio del dataset (rupias → euros).
pub const INR_TO_EUR: f64 = 0.0094;

/// Resultado explícito de una coerción numérica.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced<T> {
    /// Valor presente e interpretable.
    Value(T),
    /// Campo vacío o `NaN`: no hay dato.
    Absent,
    /// Campo presente pero ilegible; se trata como ausente.
    Invalid,
}

impl<T> Coerced<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Coerced::Value(v) => Some(v),
            Coerced::Absent | Coerced::Invalid => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Coerced::Invalid)
    }
}

/// Registro normalizado junto con los campos cuyo valor se descartó.
#[derive(Debug, Clone)]
pub struct NormalizedRow {
    pub record: PhoneRecord,
    pub discarded: Vec<&'static str>,
}

/// Normaliza una fila cruda. Devuelve `None` si falta el campo de identidad
/// (modelo vacío o ausente); cualquier otro problema se coerciona.
pub fn normalize_row(raw: &RawPhoneRow) -> Option<NormalizedRow> {
    let model = clean(raw.model.as_deref())?.to_string();

    let mut discarded = Vec::new();

    let price_eur = f64_field(&mut discarded, "price", raw.price.as_deref())
        .map(|inr| round2(inr * INR_TO_EUR));
    let rating = f64_field(&mut discarded, "rating", raw.rating.as_deref());
    let ram_gb = f64_field(&mut discarded, "ram_gb", raw.ram_gb.as_deref());
    let storage_gb = f64_field(&mut discarded, "storage_gb", raw.storage_gb.as_deref());
    let screen_size_in = f64_field(&mut discarded, "screen_size_in", raw.screen_size_in.as_deref());
    let refresh_rate_hz =
        f64_field(&mut discarded, "refresh_rate_hz", raw.refresh_rate_hz.as_deref());
    let front_camera_mp =
        f64_field(&mut discarded, "front_camera_mp", raw.front_camera_mp.as_deref());
    let battery_mah = i64_field(&mut discarded, "battery_mah", raw.battery_mah.as_deref());
    let rear_camera_count =
        i64_field(&mut discarded, "rear_camera_count", raw.rear_camera_count.as_deref());

    let record = PhoneRecord {
        model,
        price_eur,
        rating,
        os: clean_or_empty(raw.os.as_deref()),
        network_type: clean_or_empty(raw.network_type.as_deref()),
        volte: to_bool(raw.volte.as_deref()),
        nfc: to_bool(raw.nfc.as_deref()),
        ir_blaster: to_bool(raw.ir_blaster.as_deref()),
        chipset: clean_or_empty(raw.chipset.as_deref()),
        ram_gb,
        storage_gb,
        battery_mah,
        screen_size_in,
        refresh_rate_hz,
        display_type: clean_or_empty(raw.display_type.as_deref()),
        rear_camera_mp_list: clean_or_empty(raw.rear_camera_mp_list.as_deref()),
        rear_camera_count,
        front_camera_mp,
        // Misma regla booleana que el resto de flags (ver DESIGN.md).
        memory_card_supported: to_bool(raw.memory_card_supported.as_deref()),
        memory_card_type: clean_or_empty(raw.memory_card_type.as_deref()),
    };

    Some(NormalizedRow { record, discarded })
}

/// Acepta booleanos textuales "true"/"1"/"yes" sin distinguir mayúsculas.
/// Ausente o cualquier otro texto → `false`.
pub fn to_bool(value: Option<&str>) -> bool {
    match value {
        Some(raw) => matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes"),
        None => false,
    }
}

/// Coerción a coma flotante. Vacío o `NaN` → ausente; ilegible → inválido.
pub fn to_f64(value: Option<&str>) -> Coerced<f64> {
    let Some(raw) = clean(value) else {
        return Coerced::Absent;
    };
    match raw.parse::<f64>() {
        Ok(parsed) if parsed.is_nan() => Coerced::Absent,
        Ok(parsed) => Coerced::Value(parsed),
        Err(_) => Coerced::Invalid,
    }
}

/// Coerción a entero: se interpreta como flotante y se trunca ("12.9" → 12).
pub fn to_i64(value: Option<&str>) -> Coerced<i64> {
    match to_f64(value) {
        Coerced::Value(v) => Coerced::Value(v as i64),
        Coerced::Absent => Coerced::Absent,
        Coerced::Invalid => Coerced::Invalid,
    }
}

fn f64_field(
    discarded: &mut Vec<&'static str>,
    name: &'static str,
    value: Option<&str>,
) -> Option<f64> {
    let coerced = to_f64(value);
    if coerced.is_invalid() {
        discarded.push(name);
    }
    coerced.into_option()
}

fn i64_field(
    discarded: &mut Vec<&'static str>,
    name: &'static str,
    value: Option<&str>,
) -> Option<i64> {
    let coerced = to_i64(value);
    if coerced.is_invalid() {
        discarded.push(name);
    }
    coerced.into_option()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn clean(value: Option<&str>) -> Option<&str> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn clean_or_empty(value: Option<&str>) -> String {
    clean(value).unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fila_sin_modelo_no_produce_registro() {
        let vacia = RawPhoneRow::default();
        assert!(normalize_row(&vacia).is_none());

        let en_blanco = RawPhoneRow {
            model: Some("   ".to_string()),
            ..RawPhoneRow::default()
        };
        assert!(normalize_row(&en_blanco).is_none());
    }

    #[test]
    fn coercion_booleana() {
        assert!(to_bool(Some("1")));
        assert!(to_bool(Some("true")));
        assert!(to_bool(Some("Yes")));
        assert!(to_bool(Some(" TRUE ")));
        assert!(!to_bool(Some("0")));
        assert!(!to_bool(Some("no")));
        assert!(!to_bool(Some("")));
        assert!(!to_bool(None));
    }

    #[test]
    fn coercion_numerica() {
        assert_eq!(to_f64(Some("6.7")), Coerced::Value(6.7));
        assert_eq!(to_f64(Some("  ")), Coerced::Absent);
        assert_eq!(to_f64(Some("NaN")), Coerced::Absent);
        assert_eq!(to_f64(None), Coerced::Absent);
        assert_eq!(to_f64(Some("barato")), Coerced::Invalid);

        assert_eq!(to_i64(Some("12.9")), Coerced::Value(12));
        assert_eq!(to_i64(Some("5000")), Coerced::Value(5000));
        assert_eq!(to_i64(Some("n/a")), Coerced::Invalid);
    }

    #[test]
    fn conversion_de_moneda_redondea_a_dos_decimales() {
        let fila = RawPhoneRow {
            model: Some("Pixel 7".to_string()),
            price: Some("50000".to_string()),
            ..RawPhoneRow::default()
        };
        let normalizada = normalize_row(&fila).expect("la fila tiene modelo");
        assert_eq!(normalizada.record.price_eur, Some(470.0));

        let sin_precio = RawPhoneRow {
            model: Some("Pixel 7".to_string()),
            ..RawPhoneRow::default()
        };
        let normalizada = normalize_row(&sin_precio).expect("la fila tiene modelo");
        assert_eq!(normalizada.record.price_eur, None);
    }

    #[test]
    fn escenario_pixel_7() {
        let fila = RawPhoneRow {
            model: Some("Pixel 7".to_string()),
            price: Some("50000".to_string()),
            volte: Some("1".to_string()),
            os: Some("Android".to_string()),
            ..RawPhoneRow::default()
        };
        let normalizada = normalize_row(&fila).expect("la fila tiene modelo");
        let r = &normalizada.record;
        assert_eq!(r.model_key(), "pixel 7");
        assert!(r.volte);
        assert_eq!(r.os, "Android");
        assert_eq!(r.price_eur, Some(470.0));
        assert!(normalizada.discarded.is_empty());
    }

    #[test]
    fn valores_ilegibles_quedan_marcados() {
        let fila = RawPhoneRow {
            model: Some("Nokia 3310".to_string()),
            price: Some("gratis".to_string()),
            battery_mah: Some("muchísima".to_string()),
            rating: Some("4.2".to_string()),
            ..RawPhoneRow::default()
        };
        let normalizada = normalize_row(&fila).expect("la fila tiene modelo");
        assert_eq!(normalizada.record.price_eur, None);
        assert_eq!(normalizada.record.battery_mah, None);
        assert_eq!(normalizada.record.rating, Some(4.2));
        assert_eq!(normalizada.discarded, vec!["price", "battery_mah"]);
    }

    #[test]
    fn regla_unica_para_tarjeta_de_memoria() {
        let con_uno = RawPhoneRow {
            model: Some("a".to_string()),
            memory_card_supported: Some("1".to_string()),
            ..RawPhoneRow::default()
        };
        let con_true = RawPhoneRow {
            model: Some("a".to_string()),
            memory_card_supported: Some("True".to_string()),
            ..RawPhoneRow::default()
        };
        assert!(normalize_row(&con_uno).unwrap().record.memory_card_supported);
        assert!(normalize_row(&con_true).unwrap().record.memory_card_supported);
    }
}
