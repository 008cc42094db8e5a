//! Pure key calculation: `taskorder key`.

use anyhow::Result;
use taskorder::ordering::insertion_key;
use taskorder::ordering::key::fits_between;
use tracing::warn;

pub fn cmd_key(prev: Option<f64>, next: Option<f64>) -> Result<()> {
    if let Some(bad) = [prev, next].into_iter().flatten().find(|k| !k.is_finite()) {
        anyhow::bail!("Keys must be finite numbers, got {}", bad);
    }

    let key = insertion_key(prev, next);
    println!("{}", key);

    if !fits_between(key, prev, next) {
        warn!(
            key,
            ?prev,
            ?next,
            "key does not sort strictly between the neighbours; renumber the collection"
        );
    }
    Ok(())
}
