//! Hebrew-to-English lookup tables for categories and merchants.
//!
//! Keys are the exact strings the export uses. Anything not in a table is
//! passed through unchanged.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

const CATEGORIES: &[(&str, &str)] = &[
    ("מזון וצריכה", "Groceries"),
    ("מסעדות, קפה וברים", "Restaurants & Cafes"),
    ("תחבורה ורכבים", "Transportation & Vehicles"),
    ("רפואה ובתי מרקחת", "Pharmacy & Health"),
    ("פנאי, בידור וספורט", "Leisure & Entertainment"),
    ("שונות", "Miscellaneous"),
    ("עירייה וממשלה", "Municipality & Government"),
    ("ביטוח", "Insurance"),
    ("דלק, חשמל וגז", "Fuel, Electricity & Gas"),
    ("שירותי תקשורת", "Telecom Services"),
    ("חשמל ומחשבים", "Electronics & Computers"),
    ("העברת כספים", "Money Transfers"),
    ("ספרים ודפוס", "Books"),
    ("טיסות ותיירות", "Flights & Travel"),
    ("עיצוב הבית", "Home Design"),
    ("משיכת מזומן", "Cash Withdrawal"),
];

const MERCHANTS: &[(&str, &str)] = &[
    ("שיבא משק וחניה בע\"מ", "Sheba Farm & Parking"),
    ("שרות וטרינרי-עיריית רחובו", "Veterinary"),
    ("אמיר בעיר", "Amir Ba'Ir"),
    ("גד רכיבה טיפולית", "Gad Therapeutic Riding"),
    ("רשות הדואר-רכישת מוצר דאר", "Israel Post"),
    ("קרן מכבי", "Maccabi"),
    ("מרקט בעיר אייזנברג מקס אי", "Market in the City"),
    ("מדנייט רחובות", "Midnight Rehovot"),
    ("הרצל בר קפה", "Herzl Bar Cafe"),
    ("כרטיס נטען מועדון", "Prepaid Club Card"),
    ("מכבי וייסגל", "Maccabi Weisgal"),
    ("SPIRIT FITNESS   BOUTIQUE", "Spirit Fitness Boutique"),
    ("אלונית - נען מזרח", "Alonit - Naan East"),
    ("סנאקס קיוסק הנשיא", "Snacks Kiosk HaNasi"),
    ("מינמרקט האחים טוויק בע\"מ", "Twik Brothers Mini Market Ltd."),
    ("רשות הטבע והגנים - חוף פל", "Palmahim Beach"),
    ("הסתדרות מדיצינית הדסה", "Hadassah Medical"),
    ("סיבוס פלאקסי", "Sodexo Flexi"),
    ("הראל-ביטוח בריאות", "Harel - Health Insurance"),
    ("טיב טעם רשתות  רחובות", "Tiv Taam"),
    ("אשל חומרי בניין-צמרת", "Eshel Building Materials"),
    ("וויקום מובייל בע\"מ", "Wicom Mobile Ltd."),
    ("הרצליה פיצוח", "Herzliya Nuts & Seeds"),
    ("כספומט לאומי    רחובות", "Leumi ATM Rehovot"),
    ("מכון דוידסון-צמרת", "Davidson Institute"),
    ("סיטי מרקט הרצל רחובות", "City Market Herzl Rehovot"),
    ("פליינג טייגר - סינימה ראש", "Flying Tiger - Cinema Rishon"),
    ("סינמה סיטי קיוסק", "Cinema City Kiosk"),
    ("נאייקס ישראל מכונות אוטומ", "Nayax Israel Vending Machines"),
    ("מקדונלד'ס ראשון לציון", "McDonald's Rishon LeZion"),
    ("ביחד בשבילך", "Together For You"),
    ("מגדל חיים/בריאות", "Migdal - Life/Health"),
    ("דור אלון פארק המדע", "Dor Alon Science Park"),
    ("כביש 6", "Route 6"),
    ("שטראוס מים בע\"מ הו\"ק", "Strauss Water"),
    ("חברת החשמל לישראל בע\"מ", "Israel Electric"),
    ("שטראוס מים בע\"מ", "Strauss Water"),
    ("מנורה מבטחים-חיים/בריאות", "Menorah Mivtachim - Life/Health"),
    ("סופרפארם שער רחובות", "Super-Pharm"),
    ("פנגו חשבונית חודשית", "Pango"),
    ("הראל ביטוח חיים", "Harel Life Insurance"),
    ("כלל ביטוח בריאות הוק", "Clal Health Insurance"),
    ("בזק הוראות קבע", "Bezeq Standing Order"),
    ("הפניקס ביטוח", "Phoenix Insurance"),
    ("הפניקס חיים ובריאות", "Phoenix Life and Health"),
    ("דמי כרטיס", "Card Fee"),
    ("שריקי'ס ש בע\"מ", "Shriky's Ltd."),
    ("4CHEF", "4CHEF"),
    ("דוכן הפרדסן מקס איט ניכיו", "Dohan haPardes"),
    ("נייקי שנקר הרצליה", "Nike Shenkar Herzliya"),
    ("PAYBOX                 TEL AVIV      IL", "PayBox"),
    ("מקס פינוקים פלוס", "MAX Benefits Plus"),
    ("הוט סינמה רחובות", "HOT Cinema Rehovot"),
    ("בית מרקחת הנשיא", "HaNasi Pharmacy"),
    ("SEVEN EXPRESS", "Seven Express"),
    ("רכבת ישראל-רחובות (א' הדר", "Israel Railways"),
    ("רכבת ישראל-ת\"א האוניברסיט", "Israel Railways"),
    ("בית החולים הוטרינרי רחובו", "Veterinary"),
    ("פט בסט בע\"מ", "Pet Best"),
    ("עירית רחובות אינטרנט", "Rehovot Municipality"),
    ("הבאר השלישית.", "Beer haShilishit"),
    ("מחסני השוק  רחובות הנשיא", "Machsaney HaShuk"),
    ("מאכלי קייס", "Kais Foods"),
    ("בעל הבית - משלוחה", "Baal haBait - Delivery"),
    ("קונפידנס מערכות", "Konfidence Systems"),
    ("ארומה תל השומר", "Aroma Tel HaShomer"),
    ("שרות בוש/סימנס/קונסטרוקטה", "Bosch/Siemens"),
    ("משלוחה הזמנת אוכל אונליין", "Mislocha Food Delivery"),
    ("משלוחה - ריבר נודלס בר", "River Noodles Bar"),
    ("בנייני רובינשטיין בע\"מ", "Rubinstein Buildings Ltd."),
    ("אלונית - נען מערב", "Alonit - Naan West"),
    ("מסעדת ברזיל הקטנה אילת", "Little Brazil Eilat"),
    ("סופר קלאב הוטל", "Super Club Hotel"),
    ("ריף כפר דולפינים באילת בע", "Dolphin Reef Eilat Ltd."),
    ("ריף כפר הדולפינים באילת ב", "Dolphin Reef Eilat"),
    ("סופר פארם אילת קניון מול", "Super-Pharm"),
    ("מצפה תת ימי ים סוף בעמ חנ", "Coral World Underwater Observatory"),
    ("רי באר בע\"מ", "Re-Bar Ltd."),
    ("ספרינט-מגדל סונול", "Sprint - Migdal Sonol"),
    ("ספרינט מוטורוס בע\"מ -  דר", "Sprint Motors"),
    ("שטיפת אמריקן סיטי", "American City Car Wash"),
    ("אוטלו רחובות", "Otello Rehovot"),
    ("טמבורית הנשיא", "Tamburit HaNasi"),
    ("חניון פארק ויצמן רחובות", "Weizmann Park Parking"),
    ("חניוני תל אביב", "Tel Aviv Parking Lots"),
    ("KSP רחובות", "KSP"),
    ("ארנק נטען מועדון ביחד בשב", "Prepaid Wallet - Together For You"),
    ("מילתא", "Milta"),
    ("CAFE NOOK", "Cafe Nook"),
    ("סופר פארם רוטשילד", "Super-Pharm"),
    ("מקדונלד'סWALLET-", "McDonalds Wallet"),
    ("מ.תחבורה - פנגו מוביט", "Pango Moovit"),
    ("רשות המיסים-מידע", "Israel Tax Authority - Info"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationTable {
    categories: HashMap<String, String>,
    merchants: HashMap<String, String>,
}

/// Shape of a translation overrides file.
///
/// ```toml
/// [categories]
/// "ביגוד והנעלה" = "Clothing & Shoes"
///
/// [merchants]
/// "קפה לנדוור" = "Landwer Cafe"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TranslationOverrides {
    categories: HashMap<String, String>,
    merchants: HashMap<String, String>,
}

fn to_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl TranslationTable {
    /// An empty table; every lookup falls back to its input.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The tables shipped with the tool.
    pub fn builtin() -> Self {
        Self {
            categories: to_map(CATEGORIES),
            merchants: to_map(MERCHANTS),
        }
    }

    /// Merge entries from a TOML overrides file over this table.
    pub fn with_overrides_file(mut self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read translations file: {}", path.display()))?;
        let overrides: TranslationOverrides = toml::from_str(&content)
            .with_context(|| format!("Failed to parse translations file: {}", path.display()))?;
        self.categories.extend(overrides.categories);
        self.merchants.extend(overrides.merchants);
        Ok(self)
    }

    pub fn category<'a>(&'a self, original: &'a str) -> &'a str {
        self.categories
            .get(original)
            .map(String::as_str)
            .unwrap_or(original)
    }

    pub fn merchant<'a>(&'a self, original: &'a str) -> &'a str {
        self.merchants
            .get(original)
            .map(String::as_str)
            .unwrap_or(original)
    }
}
