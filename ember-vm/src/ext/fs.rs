use std::{
    fs::{self, File, Metadata, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Component, Path, PathBuf},
};

use anyhow::{bail, Context};

use crate::{
    builtins::{arg_range, exact_args, fn_arg, int_arg, min_args, str_arg},
    err::RuntimeError,
    htable::HTable,
    val::Value,
    vm::Vm,
};

pub fn import(vm: &mut Vm) {
    vm.add_function("fs-cwd", cwd);
    vm.add_function("fs-chdir", chdir);
    vm.add_function("fs-readdir", readdir);
    vm.add_function("fs-walk", walk);
    vm.add_function("fs-path-split", path_split);
    vm.add_function("fs-path-join", path_join);
    vm.add_function("fs-file-exists", file_exists);
    vm.add_function("fs-file-info", file_info);
    vm.add_function("fs-read-file", read_file);
    vm.add_function("fs-read-file-s", read_file_stream);
    vm.add_function("fs-append-file", append_file);
    vm.add_function("fs-append-file-s", append_file_stream);
    vm.add_function("fs-remove-file", remove_file);
}

#[cfg(unix)]
fn mode_of(meta: &Metadata) -> i64 {
    use std::os::unix::fs::PermissionsExt;
    i64::from(meta.permissions().mode())
}

#[cfg(not(unix))]
fn mode_of(meta: &Metadata) -> i64 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

fn info_table(path: &str, name: &str, meta: &Metadata) -> anyhow::Result<HTable> {
    let mut h = HTable::new();
    h.set("path".into(), path.into())?;
    h.set("name".into(), name.into())?;
    h.set("size".into(), Value::Int(meta.len() as i64))?;
    h.set("mode".into(), Value::Int(mode_of(meta)))?;
    h.set("isdir".into(), Value::Bool(meta.is_dir()))?;
    Ok(h)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn current_dir() -> anyhow::Result<PathBuf> {
    std::env::current_dir().context("unable to read current directory")
}

fn cwd(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    exact_args::<0>(name, args)?;
    Ok(Value::string(&current_dir()?.to_string_lossy()))
}

/// `true` on success, otherwise the error message as a string.
fn chdir(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [dir] = exact_args::<1>(name, args)?;
    match std::env::set_current_dir(str_arg(name, dir)?) {
        Ok(()) => Ok(Value::Bool(true)),
        Err(e) => Ok(Value::string(&e.to_string())),
    }
}

fn sorted_entries(dir: &Path) -> anyhow::Result<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("unable to read directory {}", dir.display()))?
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

/// `(fs-readdir [path])`: one info hash per entry, sorted by name.
fn readdir(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    arg_range(name, args, 0, 1)?;
    let dir = match args.first() {
        Some(Value::Str(s)) if !s.is_empty() => PathBuf::from(s.as_ref()),
        Some(Value::Str(_)) | None => current_dir()?,
        Some(other) => bail!(RuntimeError::mismatch(name, "string", other)),
    };
    let dir_str = dir.to_string_lossy().into_owned();

    let mut out = Vec::new();
    for entry in sorted_entries(&dir)? {
        let meta = entry.metadata()?;
        let entry_name = entry.file_name().to_string_lossy().into_owned();
        out.push(Value::hash(info_table(&dir_str, &entry_name, &meta)?));
    }
    Ok(Value::array(out))
}

/// Pre-order walk. Returns false when the callback stopped it early.
fn walk_dir(vm: &mut Vm, f: &Value, path: &Path) -> anyhow::Result<bool> {
    let meta = fs::symlink_metadata(path)
        .with_context(|| format!("unable to stat {}", path.display()))?;
    let info = info_table(&path.to_string_lossy(), &file_name(path), &meta)?;
    if vm.apply(f, &[Value::hash(info)])?.is_truthy() {
        return Ok(false);
    }
    if meta.is_dir() {
        for entry in sorted_entries(path)? {
            if !walk_dir(vm, f, &entry.path())? {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// `(fs-walk (fn [info] ...) [root])`. A truthy callback result aborts.
fn walk(vm: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    arg_range(name, args, 1, 2)?;
    fn_arg(name, &args[0])?;
    let root = match args.get(1) {
        Some(v) => PathBuf::from(str_arg(name, v)?),
        None => current_dir()?,
    };
    log::debug!("{name}: walking {}", root.display());
    Ok(Value::Bool(walk_dir(vm, &args[0], &root)?))
}

/// `"/a/b"` splits to `["/" "a" "b"]`, `"a/b"` to `["" "a" "b"]`.
fn path_split(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [path] = exact_args::<1>(name, args)?;
    let path = Path::new(str_arg(name, path)?);
    let mut parts = Vec::new();
    for (i, comp) in path.components().enumerate() {
        if i == 0 && !matches!(comp, Component::RootDir | Component::Prefix(_)) {
            parts.push(Value::string(""));
        }
        match comp {
            Component::RootDir => parts.push(Value::string("/")),
            other => parts.push(Value::string(&other.as_os_str().to_string_lossy())),
        }
    }
    if parts.is_empty() {
        parts.push(Value::string(""));
    }
    Ok(Value::array(parts))
}

fn join_into(name: &str, buf: &mut PathBuf, v: &Value) -> anyhow::Result<()> {
    match v {
        Value::Str(s) if buf.as_os_str().is_empty() => buf.push(s.as_ref()),
        Value::Str(s) => buf.push(s.trim_start_matches('/')),
        Value::Array(arr) => {
            for item in arr.borrow().iter() {
                join_into(name, buf, item)?;
            }
        }
        _ => bail!(RuntimeError::mismatch(name, "string or array", v)),
    }
    Ok(())
}

fn path_join(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let mut buf = PathBuf::new();
    for v in args.iter() {
        join_into(name, &mut buf, v)?;
    }
    Ok(Value::string(&buf.to_string_lossy()))
}

/// True when every argument names an existing file.
fn file_exists(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    min_args(name, args, 1)?;
    for v in args.iter() {
        let path = Path::new(str_arg(name, v)?);
        if !path.try_exists()? {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn file_info(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [path] = exact_args::<1>(name, args)?;
    let path_str = str_arg(name, path)?;
    let path = Path::new(path_str);
    let mut h = match fs::metadata(path) {
        Ok(meta) => info_table(path_str, &file_name(path), &meta)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let mut h = HTable::new();
            h.set("path".into(), "".into())?;
            h.set("name".into(), "".into())?;
            h.set("size".into(), Value::Int(0))?;
            h.set("mode".into(), Value::Int(0))?;
            h.set("isdir".into(), Value::Bool(false))?;
            h.set("exists".into(), Value::Bool(false))?;
            return Ok(Value::hash(h));
        }
        Err(e) => return Err(e).with_context(|| format!("unable to stat {path_str}")),
    };
    h.set("exists".into(), Value::Bool(true))?;
    Ok(Value::hash(h))
}

fn offset_arg(name: &str, args: &[Value], i: usize) -> anyhow::Result<u64> {
    match args.get(i) {
        None => Ok(0),
        Some(v) => {
            let n = int_arg(name, v)?;
            if n < 0 {
                bail!(RuntimeError::IndexOutOfBounds { index: n, len: 0 });
            }
            Ok(n as u64)
        }
    }
}

/// Opens `path` at `offset` and works out how many bytes to read: `max`,
/// or the rest of the file when `max` is 0 or runs past the end.
fn open_at(path: &str, offset: u64, max: u64) -> anyhow::Result<(File, u64)> {
    let mut f = File::open(path).with_context(|| format!("unable to open {path}"))?;
    let size = f.metadata()?.len();
    let avail = size.saturating_sub(offset);
    let want = if max == 0 || max > avail { avail } else { max };
    f.seek(SeekFrom::Start(offset))?;
    Ok((f, want))
}

/// `(fs-read-file name [offset [max]])`
fn read_file(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    arg_range(name, args, 1, 3)?;
    let path = str_arg(name, &args[0])?;
    let (f, want) = open_at(path, offset_arg(name, args, 1)?, offset_arg(name, args, 2)?)?;
    let mut buf = Vec::with_capacity(want as usize);
    f.take(want)
        .read_to_end(&mut buf)
        .with_context(|| format!("unable to read {path}"))?;
    Ok(Value::data(buf))
}

/// `(fs-read-file-s name (fn [pos data] ...) chunk [offset [max]])`. Feeds the
/// file to the callback `chunk` bytes at a time; a truthy result stops early.
/// Returns the number of bytes handed over.
fn read_file_stream(vm: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    arg_range(name, args, 3, 5)?;
    let path = str_arg(name, &args[0])?;
    let f = &args[1];
    fn_arg(name, f)?;
    let chunk = int_arg(name, &args[2])?;
    if chunk <= 0 {
        bail!(RuntimeError::mismatch(name, "positive chunk size", &args[2]));
    }
    let offset = offset_arg(name, args, 3)?;
    let (file, want) = open_at(path, offset, offset_arg(name, args, 4)?)?;

    let mut reader = file.take(want);
    // never larger than what is left to read
    let mut buf = vec![0u8; (chunk as u64).min(want).max(1) as usize];
    let mut done: u64 = 0;
    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("unable to read {path}"))?;
        if n == 0 {
            break;
        }
        let pos = Value::Int((offset + done) as i64);
        done += n as u64;
        if vm.apply(f, &[pos, Value::data(buf[..n].to_vec())])?.is_truthy() {
            break;
        }
    }
    Ok(Value::Int(done as i64))
}

fn open_append(path: &str) -> anyhow::Result<(File, u64)> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("unable to open {path} for append"))?;
    let pos = f.seek(SeekFrom::End(0))?;
    Ok((f, pos))
}

/// `(fs-append-file name data...)`: returns the end position.
fn append_file(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    min_args(name, args, 2)?;
    let path = str_arg(name, &args[0])?;
    for v in args[1..].iter() {
        if !matches!(v, Value::Data(_)) {
            bail!(RuntimeError::mismatch(name, "data", v));
        }
    }
    let (mut f, mut pos) = open_append(path)?;
    for v in args[1..].iter() {
        if let Value::Data(d) = v {
            f.write_all(d)
                .with_context(|| format!("write to {path} failed at {pos}"))?;
            pos += d.len() as u64;
        }
    }
    Ok(Value::Int(pos as i64))
}

/// `(fs-append-file-s name (fn [pos] data))`: keeps asking the callback for
/// data until it hands back an empty buffer.
fn append_file_stream(vm: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    let [path, f] = exact_args::<2>(name, args)?;
    let path = str_arg(name, path)?;
    fn_arg(name, f)?;
    let (mut file, mut pos) = open_append(path)?;
    loop {
        let res = vm.apply(f, &[Value::Int(pos as i64)])?;
        let Value::Data(d) = &res else {
            bail!(RuntimeError::mismatch(name, "data", &res));
        };
        if d.is_empty() {
            break;
        }
        file.write_all(d)
            .with_context(|| format!("write to {path} failed at {pos}"))?;
        pos += d.len() as u64;
    }
    Ok(Value::Int(pos as i64))
}

fn remove_file(_: &mut Vm, name: &str, args: &[Value]) -> anyhow::Result<Value> {
    min_args(name, args, 1)?;
    for (i, v) in args.iter().enumerate() {
        let path = str_arg(name, v)?;
        fs::remove_file(path).with_context(|| format!("{name}: arg {i}; unable to remove {path}"))?;
    }
    Ok(Value::Null)
}
