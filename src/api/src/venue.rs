//! Boat race venues and their upstream codes (jcd).

/// Canonical venue names indexed by code - 1
const VENUES: [&str; 24] = [
    "桐生", "戸田", "江戸川", "平和島", "多摩川", "浜名湖", "蒲郡", "常滑",
    "津", "三国", "びわこ", "住之江", "尼崎", "鳴門", "丸亀", "児島",
    "宮島", "徳山", "下関", "若松", "芦屋", "福岡", "唐津", "大村",
];

/// Alternative spellings users type
const ALIASES: [(&str, u8); 8] = [
    ("琵琶湖", 11),
    ("まるがめ", 15),
    ("丸ガメ", 15),
    ("marugame", 15),
    ("とこなめ", 8),
    ("tokoname", 8),
    ("すみのえ", 12),
    ("suminoe", 12),
];

/// Resolve a venue name (canonical or alias) to its code
pub fn code_of(name: &str) -> Option<u8> {
    if let Some(pos) = VENUES.iter().position(|v| *v == name) {
        return Some(pos as u8 + 1);
    }
    let lower = name.to_lowercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, code)| *code)
}

/// Canonical name for a venue code
pub fn name_of(code: u8) -> Option<&'static str> {
    VENUES.get((code as usize).checked_sub(1)?).copied()
}
