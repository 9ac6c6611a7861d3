//! Modelos de dominio (filas del CSV de smartphones y nodos del grafo Neo4j).

use std::fmt::Display;

use serde::Deserialize;

/// Una fila del CSV tal y como llega: todos los campos son texto opcional.
/// La coerción a tipos concretos ocurre en `normalize`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPhoneRow {
    pub model: Option<String>,
    pub price: Option<String>,
    pub rating: Option<String>,
    pub os: Option<String>,
    pub network_type: Option<String>,
    #[serde(rename = "VoLTE")]
    pub volte: Option<String>,
    #[serde(rename = "NFC")]
    pub nfc: Option<String>,
    pub ir_blaster: Option<String>,
    pub chipset: Option<String>,
    pub ram_gb: Option<String>,
    pub storage_gb: Option<String>,
    pub battery_mah: Option<String>,
    pub screen_size_in: Option<String>,
    pub refresh_rate_hz: Option<String>,
    pub display_type: Option<String>,
    pub rear_camera_mp_list: Option<String>,
    pub rear_camera_count: Option<String>,
    pub front_camera_mp: Option<String>,
    pub memory_card_supported: Option<String>,
    pub memory_card_type: Option<String>,
}

/// Representa un nodo (:Phone) ya normalizado. La clave de identidad es
/// `model` en minúsculas; `model` conserva el nombre tal cual para mostrarlo.
#[derive(Debug, Clone, PartialEq)]
pub struct PhoneRecord {
    pub model: String,
    pub price_eur: Option<f64>,
    pub rating: Option<f64>,
    pub os: String,
    pub network_type: String,
    pub volte: bool,
    pub nfc: bool,
    pub ir_blaster: bool,
    pub chipset: String,
    pub ram_gb: Option<f64>,
    pub storage_gb: Option<f64>,
    pub battery_mah: Option<i64>,
    pub screen_size_in: Option<f64>,
    pub refresh_rate_hz: Option<f64>,
    pub display_type: String,
    pub rear_camera_mp_list: String,
    pub rear_camera_count: Option<i64>,
    pub front_camera_mp: Option<f64>,
    pub memory_card_supported: bool,
    pub memory_card_type: String,
}

impl PhoneRecord {
    /// Clave de identidad del nodo :Phone (nunca vacía, en minúsculas).
    pub fn model_key(&self) -> String {
        self.model.to_lowercase()
    }

    /// Resumen plano `Clave=valor; …` en orden fijo. Es la unidad de
    /// recuperación del índice: expone los nombres de atributo tal cual para
    /// que la similitud léxica y la semántica se beneficien por igual.
    /// Valores ausentes se muestran vacíos; los booleanos en minúsculas.
    pub fn summary_text(&self) -> String {
        format!(
            "Model={}; Price_EUR={}; Rating={}; OS={}; Network={}; NFC={}; VoLTE={}; \
             IRBlaster={}; Chipset={}; RAM_GB={}; Storage_GB={}; Battery_mAh={}; \
             Screen_in={}; RefreshRate_Hz={}; DisplayType={}; RearCameras={}; \
             RearCameraCount={}; FrontCamera_MP={}; MemoryCardSupported={}; MemoryCardType={}",
            self.model,
            fmt_opt(&self.price_eur),
            fmt_opt(&self.rating),
            self.os,
            self.network_type,
            self.nfc,
            self.volte,
            self.ir_blaster,
            self.chipset,
            fmt_opt(&self.ram_gb),
            fmt_opt(&self.storage_gb),
            fmt_opt(&self.battery_mah),
            fmt_opt(&self.screen_size_in),
            fmt_opt(&self.refresh_rate_hz),
            self.display_type,
            self.rear_camera_mp_list,
            fmt_opt(&self.rear_camera_count),
            fmt_opt(&self.front_camera_mp),
            self.memory_card_supported,
            self.memory_card_type,
        )
    }
}

fn fmt_opt<T: Display>(value: &Option<T>) -> String {
    value.as_ref().map(T::to_string).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registro() -> PhoneRecord {
        PhoneRecord {
            model: "Pixel 7".to_string(),
            price_eur: Some(470.0),
            rating: Some(8.5),
            os: "Android".to_string(),
            network_type: "5G".to_string(),
            volte: true,
            nfc: true,
            ir_blaster: false,
            chipset: "Google Tensor G2".to_string(),
            ram_gb: Some(8.0),
            storage_gb: Some(128.0),
            battery_mah: Some(4355),
            screen_size_in: Some(6.3),
            refresh_rate_hz: Some(90.0),
            display_type: "OLED".to_string(),
            rear_camera_mp_list: "50,12".to_string(),
            rear_camera_count: Some(2),
            front_camera_mp: Some(10.8),
            memory_card_supported: false,
            memory_card_type: String::new(),
        }
    }

    #[test]
    fn clave_de_modelo_en_minusculas() {
        assert_eq!(registro().model_key(), "pixel 7");
    }

    #[test]
    fn resumen_mantiene_orden_y_formato() {
        let texto = registro().summary_text();
        assert!(texto.starts_with("Model=Pixel 7; Price_EUR=470; Rating=8.5; OS=Android; "));
        assert!(texto.contains("NFC=true; VoLTE=true; IRBlaster=false;"));
        assert!(texto.contains("RearCameras=50,12; RearCameraCount=2;"));
        assert!(texto.ends_with("MemoryCardSupported=false; MemoryCardType="));
    }

    #[test]
    fn resumen_deja_vacios_los_valores_ausentes() {
        let mut r = registro();
        r.price_eur = None;
        r.battery_mah = None;
        let texto = r.summary_text();
        assert!(texto.contains("Price_EUR=; "));
        assert!(texto.contains("Battery_mAh=; "));
    }
}
