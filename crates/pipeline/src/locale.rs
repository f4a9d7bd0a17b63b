//! Pack-provided display strings for options and screens.
//!
//! Lang files live at `/shaders/lang/<code>.lang`, one `key=value` per line
//! with `#` comments. `en_US` always loads first so a partially translated
//! language falls back per key rather than per file.

use std::collections::HashMap;

use tracing::debug;

use shaderpack::ContentProvider;

pub const DEFAULT_LANG: &str = "en_US";

#[derive(Debug, Clone, Default)]
pub struct Locale {
    entries: HashMap<String, String>,
}

impl Locale {
    /// Loads and merges the lang files for `langs` in order; later files win
    /// per key. Missing files are skipped quietly since most packs only ship
    /// `en_US`.
    pub fn load(fs: &dyn ContentProvider, langs: &[&str]) -> Self {
        let mut locale = Locale::default();
        for lang in langs {
            let path = format!("/shaders/lang/{lang}.lang");
            match fs.open(&path) {
                Ok(bytes) => {
                    locale.merge(&String::from_utf8_lossy(&bytes));
                    debug!(lang = %lang, "loaded pack lang file");
                }
                Err(_) => debug!(lang = %lang, "no pack lang file"),
            }
        }
        locale
    }

    fn merge(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                self.entries
                    .insert(key.trim().to_owned(), value.trim().to_owned());
            }
        }
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Display name for an option, falling back to the raw option name.
    pub fn option_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.raw(&format!("option.{name}")).unwrap_or(name)
    }

    /// Display text for one value of an option, with per-option prefix and
    /// suffix applied around the fallback.
    pub fn option_value(&self, name: &str, value: &str) -> String {
        if let Some(v) = self.raw(&format!("value.{name}.{value}")) {
            return v.to_owned();
        }
        let prefix = self.raw(&format!("prefix.{name}")).unwrap_or("");
        let suffix = self.raw(&format!("suffix.{name}")).unwrap_or("");
        format!("{prefix}{value}{suffix}")
    }

    /// Tooltip/comment text for an option or screen, when the pack ships one.
    pub fn comment(&self, base: &str) -> Option<&str> {
        self.raw(&format!("{base}.comment"))
    }

    pub fn profile_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.raw(&format!("profile.{name}")).unwrap_or(name)
    }

    pub fn screen_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.raw(&format!("screen.{name}")).unwrap_or(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use shaderpack::MemProvider;

    fn locale() -> Locale {
        let fs = MemProvider::new()
            .with(
                "/shaders/lang/en_US.lang",
                "# base strings\n\
                 option.SHADOW_RES=Shadow Resolution\n\
                 option.SHADOW_RES.comment=Shadow map size.\n\
                 value.SHADOW_RES.1024=Low\n\
                 suffix.SUN_ROT=\u{b0}\n\
                 profile.ULTRA=Ultra\n\
                 screen.SHADOWS=Shadows\n",
            )
            .with("/shaders/lang/de_DE.lang", "option.SHADOW_RES=Schattengr\u{f6}\u{df}e\n");
        Locale::load(&fs, &[DEFAULT_LANG, "de_DE"])
    }

    #[test]
    fn later_language_wins_per_key() {
        let l = locale();
        assert_eq!(l.option_name("SHADOW_RES"), "Schattengr\u{f6}\u{df}e");
        // key only present in en_US still resolves
        assert_eq!(l.option_value("SHADOW_RES", "1024"), "Low");
    }

    #[test]
    fn fallbacks_and_affixes() {
        let l = locale();
        assert_eq!(l.option_name("UNKNOWN"), "UNKNOWN");
        assert_eq!(l.option_value("SUN_ROT", "-40.0"), "-40.0\u{b0}");
        assert_eq!(l.profile_name("ULTRA"), "Ultra");
        assert_eq!(l.profile_name("LOW"), "LOW");
        assert_eq!(l.screen_name("SHADOWS"), "Shadows");
        assert_eq!(l.comment("option.SHADOW_RES"), Some("Shadow map size."));
        assert_eq!(l.comment("option.SUN_ROT"), None);
    }

    #[test]
    fn missing_files_are_skipped() {
        let fs = MemProvider::new();
        let l = Locale::load(&fs, &[DEFAULT_LANG]);
        assert!(l.is_empty());
    }
}
