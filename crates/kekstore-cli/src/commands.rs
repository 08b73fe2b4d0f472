use std::io::Write;

use color_eyre::{eyre::WrapErr, Result};
use kekstore_core::{Context, Cursor, Keystore};
use serde::Serialize;

/// Output layout for `list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFormat {
    Lines,
    Json,
}

#[derive(Serialize)]
struct ListOutput<'a> {
    names: &'a [String],
    next: Option<&'a Cursor>,
}

pub async fn status<K, W>(store: &K, ctx: &Context, out: &mut W) -> Result<()>
where
    K: Keystore + ?Sized,
    W: Write,
{
    let status = store.status(ctx).await?;
    writeln!(out, "{}: ok (latency {:?})", store.describe(), status.latency)?;
    Ok(())
}

pub async fn create<K: Keystore + ?Sized>(
    store: &K,
    ctx: &Context,
    name: &str,
    value: &[u8],
) -> Result<()> {
    store
        .create(ctx, name, value)
        .await
        .wrap_err_with(|| format!("failed to create {name}"))
}

/// Write the raw plaintext of `name` to `out`.
pub async fn get<K, W>(store: &K, ctx: &Context, name: &str, out: &mut W) -> Result<()>
where
    K: Keystore + ?Sized,
    W: Write,
{
    let value = store
        .get(ctx, name)
        .await
        .wrap_err_with(|| format!("failed to read {name}"))?;
    out.write_all(&value)?;
    Ok(())
}

pub async fn delete<K: Keystore + ?Sized>(store: &K, ctx: &Context, name: &str) -> Result<()> {
    store
        .delete(ctx, name)
        .await
        .wrap_err_with(|| format!("failed to delete {name}"))
}

pub async fn list<K, W>(
    store: &K,
    ctx: &Context,
    prefix: &str,
    cursor: Option<&Cursor>,
    limit: usize,
    format: ListFormat,
    out: &mut W,
) -> Result<()>
where
    K: Keystore + ?Sized,
    W: Write,
{
    let (names, next) = store.list(ctx, prefix, cursor, limit).await?;
    match format {
        ListFormat::Json => {
            let output = ListOutput {
                names: &names,
                next: next.as_ref(),
            };
            serde_json::to_writer(&mut *out, &output)?;
            writeln!(out)?;
        }
        ListFormat::Lines => {
            for name in &names {
                writeln!(out, "{name}")?;
            }
            if let Some(next) = next {
                eprintln!("More names available: --cursor {next}");
            }
        }
    }
    Ok(())
}
