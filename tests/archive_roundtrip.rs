use anyhow::Context;
use parc::archive::Archive;
use parc::config::Options;

#[test]
fn empty_archive_emit_scenario() -> anyhow::Result<()> {
    let mut archive = Archive::parse(&empty_bytes(), false).context("parsing a hand-built empty archive")?;
    let emitted = archive.emit(&Options::default()).context("emitting the empty archive")?;

    assert_eq!(emitted.len(), 0x800);
    assert_eq!(&emitted[0..4], b"PARC");
    Ok(())
}

#[test]
fn archive_with_one_top_level_file_round_trips() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir().context("creating a scratch directory")?;
    std::fs::write(tmp.path().join("hello.txt"), b"hello world")?;

    let mut archive = parc::archive::from_directory(tmp.path(), &Options::default())
        .context("importing the scratch directory")?;
    let emitted = archive.emit(&Options::default()).context("emitting the imported archive")?;

    let mut reparsed = Archive::parse(&emitted, true).context("parsing the emitted archive back")?;
    assert_eq!(reparsed.file_count(), 1);
    assert_eq!(reparsed.files()[0].name, "hello.txt");
    assert_eq!(reparsed.files()[0].data().unwrap(), b"hello world");

    reparsed.decode_all(&Options::default()).context("bulk-decoding every entry")?;
    assert_eq!(reparsed.files()[0].data().unwrap(), b"hello world");
    Ok(())
}

#[test]
fn parse_emit_parse_preserves_structure() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    std::fs::create_dir(tmp.path().join("sub"))?;
    std::fs::write(tmp.path().join("a.txt"), b"aaaa")?;
    std::fs::write(tmp.path().join("sub/b.txt"), b"bbbbbbbb")?;

    let mut archive = parc::archive::from_directory(tmp.path(), &Options::default())?;
    let first_emit = archive.emit(&Options::default())?;

    let mut once = Archive::parse(&first_emit, true)?;
    let second_emit = once.emit(&Options::default())?;
    let twice = Archive::parse(&second_emit, true)?;

    assert_eq!(once.dir_count(), twice.dir_count());
    assert_eq!(once.file_count(), twice.file_count());
    assert!(once.similar_to(&twice));
    Ok(())
}

fn empty_bytes() -> Vec<u8> {
    let mut bytes = vec![0u8; 0x800];
    bytes[0..4].copy_from_slice(b"PARC");
    bytes[5] = 1; // big-endian, per the concrete scenario in the spec
    bytes[20..24].copy_from_slice(&0x20u32.to_be_bytes());
    bytes[28..32].copy_from_slice(&0x20u32.to_be_bytes());
    bytes
}
