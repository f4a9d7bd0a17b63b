//! Settings screen model built from discovered options and pack layout.
//!
//! Types:
//! - [ChoiceKind]: how one option is presented
//! - [ScreenEntry], [Screen]: the declarative layout
//! - [Profile]: a named bundle of option values
//! - [ConfigScreen]: the whole model, owning the configurable option list
//!
//! This is pure data for a host GUI to render. The root model owns every
//! configurable option so profiles and the saved snapshot always see a
//! consistent set.

use std::collections::HashMap;

use shaderpack::{value_matches, ShaderOption, ShaderProperties, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceKind {
    Slider,
    Toggle,
    Switch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenEntry {
    /// Index into [ConfigScreen::options].
    Option { index: usize, kind: ChoiceKind },
    Profile,
    SubScreen(String),
    Empty,
}

#[derive(Debug, Clone, Default)]
pub struct Screen {
    pub name: Option<String>,
    pub entries: Vec<ScreenEntry>,
}

/// A named bundle of option values. `profile.<other>` references inline the
/// other profile's settings at parse time, so application order is flat.
#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    settings: HashMap<String, Value>,
}

impl Profile {
    fn parse(known: &[Profile], name: &str, value: &str) -> Self {
        let mut settings = HashMap::new();
        for part in value.split_whitespace() {
            match part.split_once('=') {
                Some((opt, v)) => {
                    settings.insert(opt.to_owned(), Value::detect(v));
                }
                None => {
                    if let Some(other) = part.strip_prefix("profile.") {
                        if let Some(prof) = known.iter().find(|p| p.name == other) {
                            settings.extend(
                                prof.settings.iter().map(|(k, v)| (k.clone(), v.clone())),
                            );
                        }
                        continue;
                    }
                    match part.strip_prefix('!') {
                        Some(opt) => settings.insert(opt.to_owned(), Value::Toggle(false)),
                        None => settings.insert(part.to_owned(), Value::Toggle(true)),
                    };
                }
            }
        }
        Profile {
            name: name.to_owned(),
            settings,
        }
    }

    fn matches(&self, options: &[ShaderOption], default: bool) -> bool {
        options.iter().all(|opt| {
            let Some(expected) = self.settings.get(&opt.name) else {
                return true;
            };
            let actual = if default {
                opt.default_value()
            } else {
                opt.current_value()
            };
            value_matches(actual, expected)
        })
    }

    fn apply(&self, options: &mut [ShaderOption]) {
        for opt in options {
            if let Some(expected) = self.settings.get(&opt.name) {
                opt.set_current_value(expected);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigScreen {
    options: Vec<ShaderOption>,
    initial: Vec<usize>,
    pub root: Screen,
    pub sub_screens: Vec<Screen>,
    profiles: Vec<Profile>,
}

impl ConfigScreen {
    /// Builds the model from the configurable options and the layout keys of
    /// `shaders.properties`. Without a `screen` key every option lands flat
    /// on the root page, profile selector first.
    pub fn build(options: Vec<ShaderOption>, props: Option<&ShaderProperties>) -> Self {
        let mut profiles: Vec<Profile> = Vec::new();
        if let Some(props) = props {
            for (name, value) in props.profiles() {
                let parsed = Profile::parse(&profiles, name, value);
                profiles.push(parsed);
            }
        }

        let sliders = props.map(ShaderProperties::sliders);
        let indices: HashMap<&str, usize> = options
            .iter()
            .enumerate()
            .map(|(i, opt)| (opt.name.as_str(), i))
            .collect();
        let entry_for = |index: usize| {
            let opt = &options[index];
            let kind = if sliders.is_some_and(|s| s.contains(&opt.name)) {
                ChoiceKind::Slider
            } else if opt.is_toggle() {
                ChoiceKind::Toggle
            } else {
                ChoiceKind::Switch
            };
            ScreenEntry::Option { index, kind }
        };

        let main_layout = props.and_then(|p| p.screen_main().map(|layout| (p, layout)));
        let (root, sub_screens) = match main_layout {
            None => {
                let mut entries = Vec::new();
                if !profiles.is_empty() {
                    entries.push(ScreenEntry::Profile);
                }
                entries.extend((0..options.len()).map(entry_for));
                (
                    Screen {
                        name: None,
                        entries,
                    },
                    Vec::new(),
                )
            }
            Some((props, layout)) => {
                let parse_layout = |config: &[String]| {
                    config
                        .iter()
                        .map(|element| match element.as_str() {
                            "<empty>" => ScreenEntry::Empty,
                            "<profile>" => ScreenEntry::Profile,
                            e if e.starts_with('[') && e.ends_with(']') => {
                                ScreenEntry::SubScreen(e[1..e.len() - 1].to_owned())
                            }
                            e => match indices.get(e) {
                                Some(&index) => entry_for(index),
                                None => ScreenEntry::Empty,
                            },
                        })
                        .collect::<Vec<_>>()
                };
                let root = Screen {
                    name: None,
                    entries: parse_layout(layout),
                };
                let referenced = |screen: &Screen| {
                    screen
                        .entries
                        .iter()
                        .filter_map(|e| match e {
                            ScreenEntry::SubScreen(name) => Some(name.clone()),
                            _ => None,
                        })
                        .collect::<Vec<String>>()
                };
                // sub-screens may nest, walk until no new names appear
                let mut subs: Vec<Screen> = Vec::new();
                let mut pending = referenced(&root);
                let mut seen: Vec<String> = Vec::new();
                while let Some(name) = pending.pop() {
                    if seen.contains(&name) {
                        continue;
                    }
                    seen.push(name.clone());
                    let Some(layout) = props.screen_sub(&name) else {
                        continue;
                    };
                    let screen = Screen {
                        name: Some(name),
                        entries: parse_layout(layout),
                    };
                    pending.extend(referenced(&screen));
                    subs.push(screen);
                }
                (root, subs)
            }
        };

        let initial = options.iter().map(ShaderOption::value_index).collect();
        ConfigScreen {
            options,
            initial,
            root,
            sub_screens,
            profiles,
        }
    }

    pub fn options(&self) -> &[ShaderOption] {
        &self.options
    }

    pub fn option_mut(&mut self, index: usize) -> &mut ShaderOption {
        &mut self.options[index]
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn sub_screen(&self, name: &str) -> Option<&Screen> {
        self.sub_screens
            .iter()
            .find(|s| s.name.as_deref() == Some(name))
    }

    pub fn is_modified(&self) -> bool {
        self.options
            .iter()
            .zip(&self.initial)
            .any(|(opt, &init)| opt.value_index() != init)
    }

    /// Reverts every option to the value it had when the screen was built.
    pub fn cancel(&mut self) {
        for (opt, &init) in self.options.iter_mut().zip(&self.initial) {
            opt.set_value_index(init);
        }
    }

    pub fn full_reset(&mut self) {
        for opt in &mut self.options {
            opt.reset_to_default();
        }
    }

    /// Index of the highest profile whose settings all match, or `None` for
    /// a custom mix.
    pub fn detect_profile(&self) -> Option<usize> {
        self.profiles
            .iter()
            .enumerate()
            .filter(|(_, p)| p.matches(&self.options, false))
            .map(|(i, _)| i)
            .last()
    }

    pub fn apply_profile(&mut self, index: usize) {
        let profile = self.profiles[index].clone();
        profile.apply(&mut self.options);
    }

    /// Marks the current values as the new baseline and returns the snapshot
    /// to persist: one `name=value` line per non-default option, or `None`
    /// when everything is default.
    pub fn save(&mut self) -> Option<String> {
        self.initial = self.options.iter().map(ShaderOption::value_index).collect();
        let lines: Vec<String> = self
            .options
            .iter()
            .filter(|opt| !opt.is_default())
            .map(ShaderOption::to_props)
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n") + "\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use shaderpack::{parse_const, parse_define};

    fn options() -> Vec<ShaderOption> {
        vec![
            parse_define("#define SHADOWS").unwrap(),
            parse_define("#define SHADOW_RES 1024 // [512 1024 2048]").unwrap(),
            parse_define("//#define BLOOM").unwrap(),
            parse_const("const float sunPathRotation = -40.0; // [-40.0 0.0 40.0]", false)
                .unwrap()
                .copy_with_mutability(false),
        ]
    }

    #[test]
    fn flat_layout_without_screen_key() {
        let screen = ConfigScreen::build(options(), None);
        assert_eq!(screen.root.entries.len(), 4);
        assert!(matches!(
            screen.root.entries[0],
            ScreenEntry::Option {
                index: 0,
                kind: ChoiceKind::Toggle
            }
        ));
        assert!(matches!(
            screen.root.entries[1],
            ScreenEntry::Option {
                index: 1,
                kind: ChoiceKind::Switch
            }
        ));
    }

    #[test]
    fn paged_layout_with_sliders_and_subscreens() {
        let props = ShaderProperties::parse(
            "screen=SHADOWS <profile> [POST] <empty>\n\
             screen.POST=BLOOM badname\n\
             sliders=SHADOW_RES\n\
             profile.LOW=!SHADOWS !BLOOM\n\
             profile.HIGH=SHADOWS BLOOM\n",
        );
        let screen = ConfigScreen::build(options(), Some(&props));
        assert_eq!(
            screen.root.entries,
            vec![
                ScreenEntry::Option {
                    index: 0,
                    kind: ChoiceKind::Toggle
                },
                ScreenEntry::Profile,
                ScreenEntry::SubScreen("POST".into()),
                ScreenEntry::Empty,
            ]
        );
        let post = screen.sub_screen("POST").unwrap();
        assert_eq!(
            post.entries,
            vec![
                ScreenEntry::Option {
                    index: 2,
                    kind: ChoiceKind::Toggle
                },
                ScreenEntry::Empty,
            ]
        );
        assert_eq!(screen.profiles().len(), 2);
    }

    #[test]
    fn profile_detection_and_application() {
        let props = ShaderProperties::parse(
            "profile.LOW=!SHADOWS !BLOOM SHADOW_RES=512\n\
             profile.HIGH=profile.LOW SHADOWS SHADOW_RES=2048\n",
        );
        let mut screen = ConfigScreen::build(options(), Some(&props));
        // defaults: SHADOWS on, BLOOM off, SHADOW_RES 1024 -> matches neither
        assert_eq!(screen.detect_profile(), None);

        screen.apply_profile(1);
        assert_eq!(screen.detect_profile(), Some(1));
        // HIGH inherited !BLOOM from LOW and overrode the rest
        assert!(!screen.options()[2].is_enabled());
        assert_eq!(screen.options()[1].current_value(), &Value::Int(2048));

        screen.apply_profile(0);
        assert_eq!(screen.detect_profile(), Some(0));
        assert!(!screen.options()[0].is_enabled());
    }

    #[test]
    fn snapshot_save_and_cancel() {
        let mut screen = ConfigScreen::build(options(), None);
        assert!(!screen.is_modified());
        assert_eq!(screen.save(), None);

        screen.option_mut(1).set_current_value(&Value::Int(2048));
        screen.option_mut(2).set_current_value(&Value::Toggle(true));
        assert!(screen.is_modified());
        let snapshot = screen.save().unwrap();
        assert!(snapshot.contains("SHADOW_RES=2048"));
        assert!(snapshot.contains("BLOOM=true"));
        // save rebased the modified flag
        assert!(!screen.is_modified());

        screen.option_mut(1).set_current_value(&Value::Int(512));
        screen.cancel();
        assert_eq!(screen.options()[1].current_value(), &Value::Int(2048));
    }
}
