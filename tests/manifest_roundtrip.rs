use anyhow::Context;
use parc::archive::from_directory;
use parc::config::Options;
use parc::manifest;

#[test]
fn directory_to_manifest_to_archive_round_trip() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir().context("creating a scratch directory")?;
    std::fs::write(tmp.path().join("readme.txt"), b"lorem ipsum dolor sit amet")?;

    let archive = from_directory(tmp.path(), &Options::default()).context("importing the scratch directory")?;
    let text = manifest::format(&archive);
    assert!(text.starts_with("PXD ARCHIVE MANIFEST"));

    let parsed = manifest::parse(&text).context("parsing the manifest back")?;
    assert_eq!(parsed.file_count, 1);

    let rebuilt = manifest::import(tmp.path(), &parsed, &Options::default()).context("rebuilding from manifest")?;
    assert!(archive.similar_to(&rebuilt));
    assert_eq!(rebuilt.files()[0].timestamp, archive.files()[0].timestamp);
    Ok(())
}

#[test]
fn manifest_rejects_mismatched_child_counts() {
    let text = "PXD ARCHIVE MANIFEST\n\
Name\t\n\
Plat\t2\n\
Endi\t0\n\
SExt\tN\n\
Relo\tN\n\
FSM\t1\n\
UnkA\t1\n\
DC\t0\n\
FC\t0\n\
<dir>\n\
Name\t\n\
DC\t1\n\
FDI\t0\n\
FC\t0\n\
FFI\t0\n\
Attr\t00000001\n\
</dir>\n";

    assert!(manifest::parse(text).is_err());
}
