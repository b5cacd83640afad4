//! Strategy chain repairing broken playlist entries
//!
//! Tried in order until one yields an existing file:
//! 1. path resolved while loading
//! 2. relocation map (entry dir -> new dir)
//! 3. rename map (filename regex -> substitution)
//! 4. media folder bucket
//! 5. default action, or ask the prompter
//!
//! Relocations and renames are learned from the prompter and reused for
//! every later entry of the same run.

use super::media::MediaLibrary;
use crate::model::PlaylistEntry;
use crate::prompt::{Choice, Prompter};
use anyhow::{bail, Result};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What to do with an entry no strategy could resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefaultAction {
    #[default]
    Ask,
    Skip,
    Remove,
    Exit,
}

impl FromStr for DefaultAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ask" => Ok(DefaultAction::Ask),
            "skip" => Ok(DefaultAction::Skip),
            "remove" => Ok(DefaultAction::Remove),
            "exit" => Ok(DefaultAction::Exit),
            _ => bail!("Unknown action \"{}\". Use: ask|skip|remove|exit", s),
        }
    }
}

impl fmt::Display for DefaultAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DefaultAction::Ask => "ask",
            DefaultAction::Skip => "skip",
            DefaultAction::Remove => "remove",
            DefaultAction::Exit => "exit",
        };
        f.write_str(name)
    }
}

/// Terminal state of one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Resolved(PathBuf),
    Skip,
    Remove,
    Exit,
}

/// Resolver with the session maps of one rebuild run
#[derive(Debug)]
pub struct PathResolver {
    media: MediaLibrary,
    action: DefaultAction,
    relocations: HashMap<String, PathBuf>,
    renames: Vec<(Regex, String)>,
}

impl PathResolver {
    pub fn new(media: MediaLibrary, action: DefaultAction) -> Self {
        Self {
            media,
            action,
            relocations: HashMap::new(),
            renames: Vec::new(),
        }
    }

    pub fn media(&self) -> &MediaLibrary {
        &self.media
    }

    /// Learned directory mappings
    pub fn relocations(&self) -> &HashMap<String, PathBuf> {
        &self.relocations
    }

    /// Learned (pattern, substitution) pairs, in learning order
    pub fn renames(&self) -> impl Iterator<Item = (&str, &str)> {
        self.renames.iter().map(|(re, sub)| (re.as_str(), sub.as_str()))
    }

    /// Run the strategy chain for one entry
    ///
    /// `base` is the directory relative entry dirs are taken from.
    pub fn resolve(
        &mut self,
        entry: &PlaylistEntry,
        base: &Path,
        prompter: &mut dyn Prompter,
    ) -> Result<Outcome> {
        if let Some(path) = self
            .direct(entry)
            .or_else(|| self.relocated(entry))
            .or_else(|| self.renamed(entry, base))
            .or_else(|| self.media.locate(&entry.name))
        {
            return Ok(Outcome::Resolved(path));
        }

        let action = match self.action {
            DefaultAction::Ask if !prompter.is_interactive() => DefaultAction::Skip,
            action => action,
        };

        match action {
            DefaultAction::Skip => Ok(Outcome::Skip),
            DefaultAction::Remove => Ok(Outcome::Remove),
            DefaultAction::Exit => Ok(Outcome::Exit),
            DefaultAction::Ask => self.ask(entry, base, prompter),
        }
    }

    /// #1: resolved while loading
    fn direct(&self, entry: &PlaylistEntry) -> Option<PathBuf> {
        if entry.resolved.is_none() {
            log::debug!("Not found (#1): {:?}", entry.original);
        }
        entry.resolved.clone()
    }

    /// #2: directory seen before
    fn relocated(&self, entry: &PlaylistEntry) -> Option<PathBuf> {
        let path = self.relocations.get(entry.dir())?.join(&entry.name);
        if path.exists() {
            Some(path)
        } else {
            log::debug!("Not found (#2): no path mapping for {:?}", entry.dir());
            None
        }
    }

    /// #3: filename pattern seen before
    fn renamed(&self, entry: &PlaylistEntry, base: &Path) -> Option<PathBuf> {
        let dir = base.join(entry.dir());
        let found = self
            .renames
            .iter()
            .map(|(re, sub)| dir.join(&*re.replace_all(&entry.name, sub.as_str())))
            .find(|path| path.exists());

        if found.is_none() && !self.renames.is_empty() {
            log::debug!("Not found (#3): no pattern mapping for {:?}", entry.original);
        }
        found
    }

    /// #5: ask until the answer can be applied
    fn ask(
        &mut self,
        entry: &PlaylistEntry,
        base: &Path,
        prompter: &mut dyn Prompter,
    ) -> Result<Outcome> {
        loop {
            match prompter.choose(entry)? {
                Choice::Update(path) => {
                    if path.is_file() {
                        log::info!("Updated to {:?}", path);
                        return Ok(Outcome::Resolved(path));
                    }
                    prompter.rejected(&format!("File not found! {:?}", path));
                }
                Choice::Relocate(dir) => {
                    let path = dir.join(&entry.name);
                    if path.is_file() {
                        log::debug!("New path mapping {:?} -> {:?}", entry.dir(), dir);
                        self.relocations.insert(entry.dir().to_string(), dir);
                        log::info!("Relocated to {:?}", path);
                        return Ok(Outcome::Resolved(path));
                    }
                    prompter.rejected(&format!("Not found {:?}", path));
                }
                Choice::Rename {
                    pattern,
                    substitution,
                } => {
                    let re = match Regex::new(&pattern) {
                        Ok(re) => re,
                        Err(e) => {
                            prompter.rejected(&format!("Invalid pattern \"{}\": {}", pattern, e));
                            continue;
                        }
                    };
                    let substitution = substitution_syntax(&substitution);
                    let name = re.replace_all(&entry.name, substitution.as_str()).into_owned();
                    let path = base.join(entry.dir()).join(&name);
                    if path.exists() {
                        log::debug!("New pattern mapping {:?} -> {:?}", pattern, substitution);
                        self.renames.push((re, substitution));
                        log::info!("Renamed to {:?}", name);
                        return Ok(Outcome::Resolved(path));
                    }
                    prompter.rejected(&format!("Not found {:?}", path));
                }
                Choice::Remove => return Ok(Outcome::Remove),
                Choice::Skip => return Ok(Outcome::Skip),
                Choice::Exit => return Ok(Outcome::Exit),
            }
        }
    }
}

/// Accept `\1` style back-references next to `$1`
fn substitution_syntax(sub: &str) -> String {
    let mut out = String::with_capacity(sub.len());
    let mut chars = sub.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()).copied() {
                chars.next();
                let mut group = String::from(d);
                while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()).copied() {
                    chars.next();
                    group.push(d);
                }
                out.push_str(&format!("${{{group}}}"));
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompter;
    use crate::rebuild::media::DEFAULT_ESCAPE;
    use std::fs;
    use tempfile::TempDir;

    struct Sandbox {
        dir: TempDir,
    }

    impl Sandbox {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            for name in ["media/[A-M]", "media/[N-Z]", "media/[0-9]", "old", "moved"] {
                fs::create_dir_all(dir.path().join(name)).unwrap();
            }
            Self { dir }
        }

        fn file(&self, rel: &str) -> PathBuf {
            let path = self.dir.path().join(rel);
            fs::write(&path, rel.as_bytes()).unwrap();
            fs::canonicalize(path).unwrap()
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.dir.path().join(rel)
        }

        fn resolver(&self, action: DefaultAction) -> PathResolver {
            let media = MediaLibrary::open(&self.path("media"), DEFAULT_ESCAPE).unwrap();
            PathResolver::new(media, action)
        }

        fn entry(&self, rel: &str) -> PlaylistEntry {
            PlaylistEntry::new(&self.path(rel).to_string_lossy())
        }
    }

    #[test]
    fn test_loaded_path_wins() {
        let sb = Sandbox::new();
        let file = sb.file("old/a.mp3");
        let mut entry = sb.entry("old/a.mp3");
        entry.resolved = Some(file.clone());

        let mut prompter = ScriptedPrompter::default();
        let outcome = sb
            .resolver(DefaultAction::Exit)
            .resolve(&entry, sb.dir.path(), &mut prompter)
            .unwrap();
        assert_eq!(outcome, Outcome::Resolved(file));
        assert_eq!(prompter.asked, 0);
    }

    #[test]
    fn test_media_bucket() {
        let sb = Sandbox::new();
        sb.file("media/[N-Z]/song.mp3");
        let entry = sb.entry("old/song.mp3");

        let outcome = sb
            .resolver(DefaultAction::Exit)
            .resolve(&entry, sb.dir.path(), &mut ScriptedPrompter::default())
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Resolved(sb.path("media").canonicalize().unwrap().join("[N-Z]/song.mp3"))
        );
    }

    #[test]
    fn test_default_actions() {
        let sb = Sandbox::new();
        let entry = sb.entry("old/gone.mp3");

        for (action, expected) in [
            (DefaultAction::Skip, Outcome::Skip),
            (DefaultAction::Remove, Outcome::Remove),
            (DefaultAction::Exit, Outcome::Exit),
        ] {
            let mut prompter = ScriptedPrompter::default();
            let outcome = sb
                .resolver(action)
                .resolve(&entry, sb.dir.path(), &mut prompter)
                .unwrap();
            assert_eq!(outcome, expected);
            assert_eq!(prompter.asked, 0);
        }
    }

    #[test]
    fn test_relocation_is_reused() {
        let sb = Sandbox::new();
        let a = sb.file("moved/a.mp3");
        let b = sb.file("moved/b.mp3");
        let mut resolver = sb.resolver(DefaultAction::Ask);
        let mut prompter = ScriptedPrompter::new(vec![
            Choice::Relocate(sb.path("nowhere")),
            Choice::Relocate(sb.path("moved")),
        ]);

        let first = resolver
            .resolve(&sb.entry("old/a.mp3"), sb.dir.path(), &mut prompter)
            .unwrap();
        assert_eq!(first, Outcome::Resolved(sb.path("moved/a.mp3")));
        assert_eq!(prompter.rejections.len(), 1);

        let second = resolver
            .resolve(&sb.entry("old/b.mp3"), sb.dir.path(), &mut prompter)
            .unwrap();
        assert_eq!(second, Outcome::Resolved(sb.path("moved/b.mp3")));
        assert_eq!(prompter.asked, 2);
        assert_eq!(resolver.relocations().len(), 1);
        assert!(a.is_file() && b.is_file());
    }

    #[test]
    fn test_rename_is_reused() {
        let sb = Sandbox::new();
        sb.file("old/01 - a.mp3");
        sb.file("old/02 - b.mp3");
        let mut resolver = sb.resolver(DefaultAction::Ask);
        let mut prompter = ScriptedPrompter::new(vec![
            Choice::Rename {
                pattern: "(".into(),
                substitution: "x".into(),
            },
            Choice::Rename {
                pattern: r"^(\d+)\. ".into(),
                substitution: r"\1 - ".into(),
            },
        ]);

        let first = resolver
            .resolve(&sb.entry("old/01. a.mp3"), sb.dir.path(), &mut prompter)
            .unwrap();
        assert_eq!(first, Outcome::Resolved(sb.path("old/01 - a.mp3")));
        assert_eq!(prompter.rejections.len(), 1);
        assert!(prompter.rejections[0].starts_with("Invalid pattern"));

        let second = resolver
            .resolve(&sb.entry("old/02. b.mp3"), sb.dir.path(), &mut prompter)
            .unwrap();
        assert_eq!(second, Outcome::Resolved(sb.path("old/02 - b.mp3")));
        assert_eq!(prompter.asked, 2);
        assert_eq!(resolver.renames().count(), 1);
    }

    #[test]
    fn test_update_rejects_missing_file() {
        let sb = Sandbox::new();
        let target = sb.file("moved/new.mp3");
        let mut prompter = ScriptedPrompter::new(vec![
            Choice::Update(sb.path("moved/nope.mp3")),
            Choice::Update(target.clone()),
        ]);

        let outcome = sb
            .resolver(DefaultAction::Ask)
            .resolve(&sb.entry("old/gone.mp3"), sb.dir.path(), &mut prompter)
            .unwrap();
        assert_eq!(outcome, Outcome::Resolved(target));
        assert_eq!(prompter.rejections.len(), 1);
    }

    #[test]
    fn test_empty_answers_skip() {
        let sb = Sandbox::new();
        let mut prompter = ScriptedPrompter::default();
        let outcome = sb
            .resolver(DefaultAction::Ask)
            .resolve(&sb.entry("old/gone.mp3"), sb.dir.path(), &mut prompter)
            .unwrap();
        assert_eq!(outcome, Outcome::Skip);
        assert_eq!(prompter.asked, 1);
    }

    #[test]
    fn test_substitution_syntax() {
        assert_eq!(substitution_syntax(r"\1 - \12"), "${1} - ${12}");
        assert_eq!(substitution_syntax("$1 x"), "$1 x");
        assert_eq!(substitution_syntax(r"a\b"), r"a\b");
    }

    #[test]
    fn test_action_from_str() {
        assert_eq!("SKIP".parse::<DefaultAction>().unwrap(), DefaultAction::Skip);
        assert!("maybe".parse::<DefaultAction>().is_err());
    }
}
