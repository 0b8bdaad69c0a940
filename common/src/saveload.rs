use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

fn create_file(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
    File::create(path)
        .map_err(|e| log::error!("could not create {}: {}", path.display(), e))
        .ok()
}

pub fn load_reader_json(path: &Path) -> Option<BufReader<File>> {
    let file = File::open(path).ok()?;
    Some(BufReader::new(file))
}

pub fn decode_json<T: DeserializeOwned>(x: &str) -> Option<T> {
    serde_json::from_str(x)
        .map_err(|e| log::error!("failed deserializing: {}", e))
        .ok()
}

pub fn save_json<T: Serialize>(x: &T, path: impl AsRef<Path>) -> Option<()> {
    let path = path.as_ref();
    save_silent_json(x, path)?;
    log::info!("successfully saved {}", path.display());
    Some(())
}

pub fn save_silent_json<T: Serialize>(x: &T, path: &Path) -> Option<()> {
    let file = create_file(path)?;

    let w = BufWriter::new(file);

    serde_json::to_writer_pretty(w, x)
        .map_err(|e| log::error!("failed serializing: {}", e))
        .ok()?;
    Some(())
}

pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Option<T> {
    let path = path.as_ref();
    serde_json::from_reader(load_reader_json(path)?)
        .map_err(|err| log::error!("failed deserializing {}: {}", path.display(), err))
        .map(|x| {
            log::info!("successfully loaded {}", path.display());
            x
        })
        .ok()
}
