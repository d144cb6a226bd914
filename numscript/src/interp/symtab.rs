//! Function table: builtins, command-line functions, function files and classes
//!
//! Lookup of a call `name(args)` tries, in order: a method of the dispatch
//! class, a subfunction of the file currently executing, a command-line
//! function, a loaded file function, a class constructor, a builtin. Autoload
//! and the path search come last and are driven by the interpreter, which
//! owns the autoload map.

use super::Interpreter;
use super::error::{EvalResult, ExecutionError};
use crate::ast::{FunctionDef, SourceFile, StatementList};
use crate::parser::parse_file;
use crate::value::{Value, ValueList};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Native function: arguments and requested output count in, values out
pub type BuiltinFn = fn(&mut Interpreter, &[Value], usize) -> EvalResult<ValueList>;

/// Where a user function came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionKind {
    CommandLine,
    File,
    Subfunction,
    Constructor { class: String },
    Method { class: String },
}

/// A user-defined function ready to be called
pub struct UserFunction {
    pub name: String,
    pub def: Rc<FunctionDef>,
    pub file: Option<PathBuf>,
    /// Full text of the defining file, for echo and the debugger
    pub source: Option<Rc<str>>,
    pub kind: FunctionKind,
    /// `persistent` variables, shared by every activation
    pub persistent: Rc<RefCell<HashMap<String, Value>>>,
}

impl fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserFunction")
            .field("name", &self.name)
            .field("file", &self.file)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl UserFunction {
    pub fn new(def: Rc<FunctionDef>, kind: FunctionKind) -> Self {
        UserFunction {
            name: def.name.clone(),
            def,
            file: None,
            source: None,
            kind,
            persistent: Rc::default(),
        }
    }

    pub fn with_file(mut self, file: PathBuf, source: Rc<str>) -> Self {
        self.file = Some(file);
        self.source = Some(source);
        self
    }

    pub fn class(&self) -> Option<&str> {
        match &self.kind {
            FunctionKind::Constructor { class } | FunctionKind::Method { class } => Some(class),
            _ => None,
        }
    }

    pub fn is_constructor(&self) -> bool {
        matches!(self.kind, FunctionKind::Constructor { .. })
    }
}

/// A script file: statements run in the caller's workspace
pub struct UserScript {
    pub name: String,
    pub file: Option<PathBuf>,
    pub body: Rc<StatementList>,
    pub source: Option<Rc<str>>,
}

impl fmt::Debug for UserScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserScript")
            .field("name", &self.name)
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}

/// Resolved target of a call
#[derive(Clone)]
pub enum Callable {
    Builtin(BuiltinFn),
    Function(Rc<UserFunction>),
    Script(Rc<UserScript>),
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Builtin(_) => f.write_str("Builtin"),
            Callable::Function(u) => write!(f, "Function({})", u.name),
            Callable::Script(s) => write!(f, "Script({})", s.name),
        }
    }
}

/// Functions of one file: the main one and its subfunctions
#[derive(Debug)]
struct FileFunctions {
    main: Rc<UserFunction>,
    subs: HashMap<String, Rc<UserFunction>>,
}

#[derive(Debug, Default)]
struct ClassInfo {
    constructor: Option<Rc<UserFunction>>,
    methods: HashMap<String, Rc<UserFunction>>,
}

/// Context of a lookup
#[derive(Debug, Default, Clone, Copy)]
pub struct LookupScope<'a> {
    /// Class of the first object argument
    pub dispatch_class: Option<&'a str>,
    /// File of the function currently executing
    pub current_file: Option<&'a Path>,
}

/// What a loaded file turned out to be
pub enum Loaded {
    Function(Rc<UserFunction>),
    Script(Rc<UserScript>),
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    builtins: HashMap<String, BuiltinFn>,
    cmdline: HashMap<String, Rc<UserFunction>>,
    /// Loaded function files by path
    files: HashMap<PathBuf, FileFunctions>,
    /// Main function name to file path
    loaded: HashMap<String, PathBuf>,
    scripts: HashMap<String, Rc<UserScript>>,
    classes: HashMap<String, ClassInfo>,
    /// Directories searched for `<name>.m` and `@Class/`
    path: Vec<PathBuf>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_path(&mut self, path: Vec<PathBuf>) {
        self.path = path;
    }

    pub fn add_path(&mut self, dir: PathBuf) {
        if !self.path.contains(&dir) {
            self.path.insert(0, dir);
        }
    }

    pub fn path(&self) -> &[PathBuf] {
        &self.path
    }

    pub fn install_builtin(&mut self, name: &str, f: BuiltinFn) {
        self.builtins.insert(name.to_string(), f);
    }

    pub fn builtin(&self, name: &str) -> Option<BuiltinFn> {
        self.builtins.get(name).copied()
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    /// Define (or redefine) a command-line function
    pub fn install_cmdline_function(&mut self, def: Rc<FunctionDef>) -> Rc<UserFunction> {
        let f = Rc::new(UserFunction::new(def, FunctionKind::CommandLine));
        tracing::debug!(name = %f.name, "command-line function defined");
        self.cmdline.insert(f.name.clone(), Rc::clone(&f));
        f
    }

    pub fn is_cmdline_function(&self, name: &str) -> bool {
        self.cmdline.contains_key(name)
    }

    /// Install a constructor or method for `class` without a backing file
    pub fn install_class_function(&mut self, class: &str, def: Rc<FunctionDef>) -> Rc<UserFunction> {
        let kind = if def.name == class {
            FunctionKind::Constructor {
                class: class.to_string(),
            }
        } else {
            FunctionKind::Method {
                class: class.to_string(),
            }
        };
        let f = Rc::new(UserFunction::new(def, kind));
        let info = self.classes.entry(class.to_string()).or_default();
        if f.is_constructor() {
            info.constructor = Some(Rc::clone(&f));
        } else {
            info.methods.insert(f.name.clone(), Rc::clone(&f));
        }
        f
    }

    /// Steps of the lookup that need no autoload or path search
    pub fn find_loaded(&self, name: &str, scope: LookupScope<'_>) -> Option<Callable> {
        if let Some(class) = scope.dispatch_class
            && let Some(m) = self.classes.get(class).and_then(|c| c.methods.get(name))
        {
            return Some(Callable::Function(Rc::clone(m)));
        }
        if let Some(file) = scope.current_file
            && let Some(sub) = self.files.get(file).and_then(|f| f.subs.get(name))
        {
            return Some(Callable::Function(Rc::clone(sub)));
        }
        if let Some(f) = self.cmdline.get(name) {
            return Some(Callable::Function(Rc::clone(f)));
        }
        if let Some(f) = self.loaded.get(name).and_then(|p| self.files.get(p)) {
            return Some(Callable::Function(Rc::clone(&f.main)));
        }
        if let Some(s) = self.scripts.get(name) {
            return Some(Callable::Script(Rc::clone(s)));
        }
        if let Some(ctor) = self.classes.get(name).and_then(|c| c.constructor.as_ref()) {
            return Some(Callable::Function(Rc::clone(ctor)));
        }
        self.builtins.get(name).map(|&f| Callable::Builtin(f))
    }

    /// Full lookup except autoload: loaded functions, then `@Class/` dirs and the path
    pub fn find_function(
        &mut self,
        name: &str,
        scope: LookupScope<'_>,
    ) -> Result<Option<Callable>, ExecutionError> {
        if let Some(class) = scope.dispatch_class
            && let Some(m) = self.find_method(class, name)?
        {
            return Ok(Some(Callable::Function(m)));
        }
        if let Some(found) = self.find_loaded(name, scope) {
            return Ok(Some(found));
        }
        if let Some(ctor) = self.find_constructor(name)? {
            return Ok(Some(Callable::Function(ctor)));
        }
        Ok(None)
    }

    /// Search the path for `<name>.m`
    pub fn find_on_path(&mut self, name: &str) -> Result<Option<Callable>, ExecutionError> {
        match self.locate_file(name) {
            Some(file) => self.load_file(&file, Some(name)).map(|l| Some(l.into())),
            None => Ok(None),
        }
    }

    pub fn locate_file(&self, name: &str) -> Option<PathBuf> {
        let file_name = format!("{name}.m");
        self.path
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|p| p.is_file())
    }

    fn class_dirs(&self, class: &str) -> Vec<PathBuf> {
        self.path
            .iter()
            .map(|dir| dir.join(format!("@{class}")))
            .filter(|d| d.is_dir())
            .collect()
    }

    /// Method `name` of `class`, loading `@class/name.m` on first use
    pub fn find_method(&mut self, class: &str, name: &str) -> Result<Option<Rc<UserFunction>>, ExecutionError> {
        if name == class {
            return Ok(None);
        }
        if let Some(m) = self.classes.get(class).and_then(|c| c.methods.get(name)) {
            return Ok(Some(Rc::clone(m)));
        }
        let file_name = format!("{name}.m");
        let Some(file) = self
            .class_dirs(class)
            .into_iter()
            .map(|d| d.join(&file_name))
            .find(|p| p.is_file())
        else {
            return Ok(None);
        };
        match self.load_file(&file, Some(name))? {
            Loaded::Function(f) => Ok(Some(f)),
            Loaded::Script(_) => Ok(None),
        }
    }

    pub fn find_constructor(&mut self, class: &str) -> Result<Option<Rc<UserFunction>>, ExecutionError> {
        if let Some(ctor) = self.classes.get(class).and_then(|c| c.constructor.as_ref()) {
            return Ok(Some(Rc::clone(ctor)));
        }
        let file_name = format!("{class}.m");
        let Some(file) = self
            .class_dirs(class)
            .into_iter()
            .map(|d| d.join(&file_name))
            .find(|p| p.is_file())
        else {
            return Ok(None);
        };
        match self.load_file(&file, Some(class))? {
            Loaded::Function(f) if f.is_constructor() => Ok(Some(f)),
            _ => Ok(None),
        }
    }

    pub fn is_class(&self, class: &str) -> bool {
        self.classes.contains_key(class) || !self.class_dirs(class).is_empty()
    }

    /// Names of the known methods of `class`, sorted
    pub fn methods(&mut self, class: &str) -> Vec<String> {
        for dir in self.class_dirs(class) {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|e| e == "m")
                    && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                    && stem != class
                {
                    let stem = stem.to_string();
                    // unparsable method files are reported when called
                    let _ = self.find_method(class, &stem);
                }
            }
        }
        let mut names: Vec<String> = self
            .classes
            .get(class)
            .map(|c| c.methods.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Parse and install a file. `name` overrides the main function's declared name.
    pub fn load_file(&mut self, file: &Path, name: Option<&str>) -> Result<Loaded, ExecutionError> {
        let text = std::fs::read_to_string(file).map_err(|e| {
            ExecutionError::general(format!("unable to read file '{}': {e}", file.display()))
        })?;
        let stem = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let name = name.map_or(stem, str::to_string);
        let class = file
            .parent()
            .and_then(Path::file_name)
            .and_then(|d| d.to_str())
            .and_then(|d| d.strip_prefix('@'))
            .map(str::to_string);
        let source: Rc<str> = Rc::from(text.as_str());
        let parsed = parse_file(&text).map_err(|e| {
            ExecutionError::parse(format!(
                "parse error in {}: {}",
                file.display(),
                e.message()
            ))
        })?;
        tracing::debug!(name = %name, file = %file.display(), "loading file");

        match parsed {
            SourceFile::Script(body) => {
                let script = Rc::new(UserScript {
                    name: name.clone(),
                    file: Some(file.to_path_buf()),
                    body: Rc::new(body),
                    source: Some(source),
                });
                self.scripts.insert(name, Rc::clone(&script));
                Ok(Loaded::Script(script))
            }
            SourceFile::Functions(defs) => {
                let mut defs = defs.into_iter();
                let Some(mut main_def) = defs.next() else {
                    return Err(ExecutionError::parse(format!(
                        "no function defined in {}",
                        file.display()
                    )));
                };
                main_def.name = name.clone();
                let kind = match &class {
                    Some(c) if *c == name => FunctionKind::Constructor { class: c.clone() },
                    Some(c) => FunctionKind::Method { class: c.clone() },
                    None => FunctionKind::File,
                };
                let main = Rc::new(
                    UserFunction::new(Rc::new(main_def), kind)
                        .with_file(file.to_path_buf(), Rc::clone(&source)),
                );
                let subs = defs
                    .map(|def| {
                        let f = UserFunction::new(Rc::new(def), FunctionKind::Subfunction)
                            .with_file(file.to_path_buf(), Rc::clone(&source));
                        (f.name.clone(), Rc::new(f))
                    })
                    .collect();
                match &class {
                    Some(c) => {
                        let info = self.classes.entry(c.clone()).or_default();
                        if main.is_constructor() {
                            info.constructor = Some(Rc::clone(&main));
                        } else {
                            info.methods.insert(name.clone(), Rc::clone(&main));
                        }
                    }
                    None => {
                        self.loaded.insert(name, file.to_path_buf());
                    }
                }
                self.files.insert(
                    file.to_path_buf(),
                    FileFunctions {
                        main: Rc::clone(&main),
                        subs,
                    },
                );
                Ok(Loaded::Function(main))
            }
        }
    }

    /// A function or script defined by a loaded file
    pub fn is_file_function(&self, name: &str) -> bool {
        self.loaded.contains_key(name) || self.scripts.contains_key(name)
    }

    /// `clear name`: forget a command-line or loaded function
    pub fn clear_function(&mut self, name: &str) -> bool {
        let mut found = self.cmdline.remove(name).is_some();
        found |= self.scripts.remove(name).is_some();
        if let Some(path) = self.loaded.remove(name) {
            self.files.remove(&path);
            found = true;
        }
        found
    }

    /// `clear functions`
    pub fn clear_functions(&mut self) {
        self.cmdline.clear();
        self.files.clear();
        self.loaded.clear();
        self.scripts.clear();
        self.classes.clear();
    }

    /// Names of command-line functions, sorted
    pub fn cmdline_function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cmdline.keys().cloned().collect();
        names.sort();
        names
    }
}

impl From<Loaded> for Callable {
    fn from(l: Loaded) -> Self {
        match l {
            Loaded::Function(f) => Callable::Function(f),
            Loaded::Script(s) => Callable::Script(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::ast::Stmt;

    fn cmdline_def(src: &str) -> Rc<FunctionDef> {
        let list = parse(src).unwrap();
        match &list[0].kind {
            Stmt::FunctionDef(def) => Rc::clone(def),
            other => panic!("expected function definition, got {other:?}"),
        }
    }

    fn noop(_: &mut Interpreter, _: &[Value], _: usize) -> EvalResult<ValueList> {
        Ok(Vec::new())
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("numscript-symtab-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_cmdline_function_shadows_builtin() {
        let mut st = SymbolTable::new();
        st.install_builtin("f", noop);
        assert!(matches!(st.find_loaded("f", LookupScope::default()), Some(Callable::Builtin(_))));
        st.install_cmdline_function(cmdline_def("function y = f(x)\n y = x;\nend\n"));
        assert!(matches!(st.find_loaded("f", LookupScope::default()), Some(Callable::Function(_))));
        assert!(st.clear_function("f"));
        assert!(matches!(st.find_loaded("f", LookupScope::default()), Some(Callable::Builtin(_))));
    }

    #[test]
    fn test_method_wins_for_dispatch_class() {
        let mut st = SymbolTable::new();
        st.install_cmdline_function(cmdline_def("function r = show(x)\n r = 1;\nend\n"));
        st.install_class_function("Pt", cmdline_def("function r = show(p)\n r = 2;\nend\n"));
        let scope = LookupScope {
            dispatch_class: Some("Pt"),
            current_file: None,
        };
        match st.find_loaded("show", scope) {
            Some(Callable::Function(f)) => assert_eq!(f.class(), Some("Pt")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_path_search_loads_function_and_subfunctions() {
        let dir = temp_dir("path");
        std::fs::write(
            dir.join("twice.m"),
            "function y = twice(x)\n  y = helper(x);\nend\nfunction z = helper(x)\n  z = 2*x;\nend\n",
        )
        .unwrap();
        let mut st = SymbolTable::new();
        st.set_path(vec![dir.clone()]);
        let Some(Callable::Function(f)) = st.find_on_path("twice").unwrap() else {
            panic!("twice.m not loaded");
        };
        assert_eq!(f.kind, FunctionKind::File);
        let scope = LookupScope {
            dispatch_class: None,
            current_file: f.file.as_deref(),
        };
        assert!(matches!(st.find_loaded("helper", scope), Some(Callable::Function(_))));
        assert!(st.find_loaded("helper", LookupScope::default()).is_none());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_class_directory() {
        let dir = temp_dir("class");
        let class_dir = dir.join("@Pt");
        std::fs::create_dir_all(&class_dir).unwrap();
        std::fs::write(class_dir.join("Pt.m"), "function p = Pt(x)\n  p.x = x;\nend\n").unwrap();
        std::fs::write(class_dir.join("norm1.m"), "function n = norm1(p)\n  n = p.x;\nend\n").unwrap();
        let mut st = SymbolTable::new();
        st.set_path(vec![dir.clone()]);
        assert!(st.is_class("Pt"));
        assert!(st.find_constructor("Pt").unwrap().is_some());
        assert_eq!(st.methods("Pt"), vec!["norm1"]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_script_file() {
        let dir = temp_dir("script");
        std::fs::write(dir.join("setup.m"), "a = 1;\n").unwrap();
        let mut st = SymbolTable::new();
        st.set_path(vec![dir.clone()]);
        assert!(matches!(st.find_on_path("setup").unwrap(), Some(Callable::Script(_))));
        assert!(st.is_file_function("setup"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
