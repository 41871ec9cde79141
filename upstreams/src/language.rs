use serde::{Deserialize, Serialize};

/// Languages the assistant can answer in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Hindi,
    Marathi,
    Gujarati,
    Punjabi,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::English,
        Language::Hindi,
        Language::Marathi,
        Language::Gujarati,
        Language::Punjabi,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|language| language.as_str() == name)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Hindi => "hindi",
            Language::Marathi => "marathi",
            Language::Gujarati => "gujarati",
            Language::Punjabi => "punjabi",
        }
    }

    /// How the language is named in prompts.
    pub const fn prompt_label(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi (Devanagari script)",
            Language::Marathi => "Marathi",
            Language::Gujarati => "Gujarati",
            Language::Punjabi => "Punjabi",
        }
    }

    /// Canned assistant reply used when no completion is available.
    pub const fn fallback_reply(&self) -> &'static str {
        match self {
            Language::English => {
                "I'm here to help you with your farming questions! Due to high demand, I'm working on getting you the best answer. Meanwhile, consider consulting local agricultural experts or KVK centers."
            }
            Language::Hindi => {
                "मैं आपके खेती के सवालों में आपकी मदद करने के लिए यहाँ हूँ! अधिक मांग के कारण, मैं आपको सर्वोत्तम उत्तर देने पर काम कर रहा हूँ।"
            }
            Language::Marathi => {
                "मी तुमच्या शेतीच्या प्रश्नांसाठी मदत करण्यासाठी येथे आहे! जास्त मागणीमुळे, मी तुम्हाला सर्वोत्तम उत्तर मिळवून देण्यावर काम करत आहे।"
            }
            Language::Gujarati => {
                "હું તમારા ખેતીના પ્રશ્નોમાં મદદ કરવા માટે અહીં છું! વધુ માંગને કારણે, હું તમને શ્રેષ્ઠ જવાબ આપવા પર કામ કરી રહ્યો છું।"
            }
            Language::Punjabi => {
                "ਮੈਂ ਤੁਹਾਡੇ ਖੇਤੀ ਦੇ ਸਵਾਲਾਂ ਵਿੱਚ ਮਦਦ ਕਰਨ ਲਈ ਇੱਥੇ ਹਾਂ! ਵਧੇਰੇ ਮੰਗ ਕਾਰਨ, ਮੈਂ ਤੁਹਾਨੂੰ ਸਭ ਤੋਂ ਵਧੀਆ ਜਵਾਬ ਦੇਣ 'ਤੇ ਕੰਮ ਕਰ ਰਿਹਾ ਹਾਂ।"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for language in Language::ALL {
            assert_eq!(Language::from_name(language.as_str()), Some(language));
        }
        assert_eq!(Language::from_name("klingon"), None);
        assert_eq!(Language::from_name("Hindi"), None);
    }

    #[test]
    fn hindi_prompt_names_script() {
        assert_eq!(Language::Hindi.prompt_label(), "Hindi (Devanagari script)");
        assert_eq!(Language::default(), Language::English);
    }
}
