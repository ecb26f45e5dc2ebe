use album_arrange::catalog::CATALOG_FILENAME;
use album_arrange::dedup::{self, Asset};
use album_arrange::placement::{PlacementOptions, Placer};
use album_arrange::time::CaptureTime;
use album_arrange::{
    CatalogRepository, CatalogStore, Command, Config, CorruptCatalogPolicy, Error, FileOperation,
    ProcessingStatus, Processor,
};
use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone};
use filetime::FileTime;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

fn local(day: u32, hour: u32) -> NaiveDateTime {
    local_in(5, day, hour)
}

fn local_in(month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, month, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

/// Write `content` to `path` and stamp its modification time
fn write_asset(path: &Path, content: &[u8], at: NaiveDateTime) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
    let stamp = Local.from_local_datetime(&at).single().unwrap().timestamp();
    filetime::set_file_mtime(path, FileTime::from_unix_time(stamp, 0)).unwrap();
}

fn read_catalog(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

struct Workspace {
    _dir: TempDir,
    roll: PathBuf,
    work: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let roll = dir.path().join("roll");
        let work = dir.path().join("albums");
        fs::create_dir_all(&roll).unwrap();
        fs::create_dir_all(&work).unwrap();
        Self {
            _dir: dir,
            roll,
            work,
        }
    }

    fn config(&self, project: &str) -> Config {
        Config {
            import_path: Some(self.roll.clone()),
            work_path: self.work.clone(),
            project_name: Some(project.to_string()),
            hash_size: 1024,
            ..Config::default()
        }
    }

    fn year_dir(&self, project: &str) -> PathBuf {
        self.work.join(project).join("2023")
    }
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n != CATALOG_FILENAME)
        .collect();
    names.sort();
    names
}

#[test]
fn test_import_numbers_assets_by_date() {
    let ws = Workspace::new();
    write_asset(&ws.roll.join("c.JPG"), b"first", local(1, 9));
    write_asset(&ws.roll.join("a.JPG"), b"second", local(2, 9));
    write_asset(&ws.roll.join("b.JPG"), b"third", local(3, 9));

    let mut processor = Processor::new(ws.config("Roll"));
    processor.run(Command::ImportAssets).unwrap();

    let year_dir = ws.year_dir("Roll");
    assert_eq!(
        file_names(&year_dir),
        vec!["202305_0001.JPG", "202305_0002.JPG", "202305_0003.JPG"]
    );
    assert_eq!(fs::read(year_dir.join("202305_0001.JPG")).unwrap(), b"first");
    assert_eq!(fs::read(year_dir.join("202305_0003.JPG")).unwrap(), b"third");
    assert!(file_names(&ws.roll).is_empty());

    let catalog = read_catalog(&year_dir.join(CATALOG_FILENAME));
    assert_eq!(catalog["index"]["202305"], 4);
    assert_eq!(catalog["hash"].as_object().unwrap().len(), 3);
    assert_eq!(processor.stats().placed, 3);
    assert_eq!(processor.stats().catalogs_written, 1);
}

#[test]
fn test_live_photo_pair_shares_sequence() {
    let ws = Workspace::new();
    write_asset(&ws.roll.join("IMG_0001.JPG"), b"still", local(1, 9));
    write_asset(&ws.roll.join("IMG_0001.MOV"), b"motion", local(1, 9));
    write_asset(&ws.roll.join("IMG_0002.HEIC"), b"later", local(1, 10));

    let mut processor = Processor::new(ws.config("Roll"));
    processor.run(Command::ImportAssets).unwrap();

    assert_eq!(
        file_names(&ws.year_dir("Roll")),
        vec!["202305_0001.JPG", "202305_0001.MOV", "202305_0002.HEIC"]
    );
    let catalog = read_catalog(&ws.year_dir("Roll").join(CATALOG_FILENAME));
    assert_eq!(catalog["index"]["202305"], 3);
}

#[test]
fn test_live_photo_across_month_boundary() {
    let ws = Workspace::new();
    for day in 1..=4 {
        let name = format!("P{}.JPG", day);
        write_asset(&ws.roll.join(name), format!("may {}", day).as_bytes(), local(day, 9));
    }
    write_asset(&ws.roll.join("IMG_LIVE.JPG"), b"still", local(31, 23));
    write_asset(&ws.roll.join("IMG_LIVE.MOV"), b"motion", local_in(6, 1, 1));
    for day in 2..=3 {
        let name = format!("V{}.MOV", day);
        write_asset(&ws.roll.join(name), format!("june {}", day).as_bytes(), local_in(6, day, 9));
    }

    let mut processor = Processor::new(ws.config("Roll"));
    processor.run(Command::ImportAssets).unwrap();

    let year_dir = ws.year_dir("Roll");
    assert_eq!(fs::read(year_dir.join("202305_0005.JPG")).unwrap(), b"still");
    assert_eq!(fs::read(year_dir.join("202306_0005.MOV")).unwrap(), b"motion");
    assert_eq!(fs::read(year_dir.join("202306_0006.MOV")).unwrap(), b"june 2");
    assert_eq!(fs::read(year_dir.join("202306_0007.MOV")).unwrap(), b"june 3");

    let catalog = read_catalog(&year_dir.join(CATALOG_FILENAME));
    assert_eq!(catalog["index"]["202306"], 8);
    assert_eq!(catalog["hash"].as_object().unwrap().len(), 8);
}

#[test]
fn test_reimport_skips_known_content() {
    let ws = Workspace::new();
    write_asset(&ws.roll.join("a.JPG"), b"alpha", local(1, 9));
    write_asset(&ws.roll.join("b.JPG"), b"beta", local(2, 9));

    let mut config = ws.config("Roll");
    config.operation = FileOperation::Copy;
    Processor::new(config.clone())
        .run(Command::ImportAssets)
        .unwrap();

    let catalog_path = ws.year_dir("Roll").join(CATALOG_FILENAME);
    let before = fs::read_to_string(&catalog_path).unwrap();

    let mut again = Processor::new(config);
    let results = again.run(Command::ImportAssets).unwrap();

    assert_eq!(again.stats().placed, 0);
    assert_eq!(again.stats().duplicates, 2);
    assert_eq!(again.stats().catalogs_written, 0);
    assert!(
        results
            .iter()
            .all(|r| r.status == ProcessingStatus::Duplicate)
    );
    assert_eq!(fs::read_to_string(&catalog_path).unwrap(), before);
    assert_eq!(file_names(&ws.year_dir("Roll")).len(), 2);
    assert_eq!(file_names(&ws.roll), vec!["a.JPG", "b.JPG"]);
}

#[test]
fn test_batch_duplicate_placed_once() {
    let ws = Workspace::new();
    write_asset(&ws.roll.join("a.JPG"), b"same bytes", local(1, 9));
    write_asset(&ws.roll.join("copy").join("a.JPG"), b"same bytes", local(1, 9));

    let mut processor = Processor::new(ws.config("Roll"));
    processor.run(Command::ImportAssets).unwrap();

    assert_eq!(file_names(&ws.year_dir("Roll")), vec!["202305_0001.JPG"]);
    assert_eq!(processor.stats().duplicates, 1);
}

#[test]
fn test_date_folders() {
    let ws = Workspace::new();
    write_asset(&ws.roll.join("a.JPG"), b"one", local(1, 9));
    write_asset(&ws.roll.join("b.JPG"), b"two", local(2, 9));

    let mut config = ws.config("Roll");
    config.date_folders = true;
    Processor::new(config).run(Command::ImportAssets).unwrap();

    let year_dir = ws.year_dir("Roll");
    assert!(year_dir.join("2023-05-01").join("202305_0001.JPG").is_file());
    assert!(year_dir.join("2023-05-02").join("202305_0002.JPG").is_file());
    assert!(year_dir.join(CATALOG_FILENAME).is_file());
}

#[test]
fn test_dry_run_touches_nothing() {
    let ws = Workspace::new();
    write_asset(&ws.roll.join("a.JPG"), b"one", local(1, 9));

    let mut config = ws.config("Roll");
    config.dry_run = true;
    let mut processor = Processor::new(config);
    let results = processor.run(Command::ImportAssets).unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, ProcessingStatus::DryRun);
    assert!(ws.roll.join("a.JPG").is_file());
    assert!(!ws.work.join("Roll").exists());
}

#[test]
fn test_corrupt_catalog_fails_by_default() {
    let ws = Workspace::new();
    write_asset(&ws.roll.join("a.JPG"), b"one", local(1, 9));
    let year_dir = ws.year_dir("Roll");
    fs::create_dir_all(&year_dir).unwrap();
    fs::write(year_dir.join(CATALOG_FILENAME), b"{ not json").unwrap();

    let mut processor = Processor::new(ws.config("Roll"));
    assert!(matches!(
        processor.run(Command::ImportAssets),
        Err(Error::CorruptCatalog { .. })
    ));
    assert!(ws.roll.join("a.JPG").is_file());

    let mut config = ws.config("Roll");
    config.corrupt_catalog = CorruptCatalogPolicy::Reset;
    Processor::new(config).run(Command::ImportAssets).unwrap();

    assert!(year_dir.join("202305_0001.JPG").is_file());
    let catalog = read_catalog(&year_dir.join(CATALOG_FILENAME));
    assert_eq!(catalog["hash"].as_object().unwrap().len(), 1);
}

#[test]
fn test_existing_destination_aborts_before_catalog_write() {
    let ws = Workspace::new();
    write_asset(&ws.roll.join("a.JPG"), b"one", local(1, 9));
    let year_dir = ws.year_dir("Roll");
    fs::create_dir_all(&year_dir).unwrap();
    fs::write(year_dir.join("202305_0001.JPG"), b"stray").unwrap();

    let mut processor = Processor::new(ws.config("Roll"));
    assert!(matches!(
        processor.run(Command::ImportAssets),
        Err(Error::DestinationExists { .. })
    ));
    assert!(!year_dir.join(CATALOG_FILENAME).exists());
    assert_eq!(fs::read(year_dir.join("202305_0001.JPG")).unwrap(), b"stray");
}

#[test]
fn test_repair_uses_capture_times() {
    let ws = Workspace::new();
    let april = ws.roll.join("april.JPG");
    let june = ws.roll.join("june.JPG");
    // Both files start out in May; only the repaired times move them.
    write_asset(&june, b"june", local(1, 9));
    write_asset(&april, b"april", local(2, 9));

    let mut captured = HashMap::new();
    captured.insert(april.clone(), local_in(4, 10, 8));
    captured.insert(june.clone(), local_in(6, 20, 8));

    let mut config = ws.config("Roll");
    config.repair = true;
    config.date_folders = true;
    let mut processor = Processor::new(config).with_timestamp_source(Box::new(captured));
    processor.run(Command::ImportAssets).unwrap();

    let year_dir = ws.year_dir("Roll");
    assert_eq!(processor.stats().repaired, 2);
    assert_eq!(
        fs::read(year_dir.join("2023-04-10").join("202304_0001.JPG")).unwrap(),
        b"april"
    );
    assert_eq!(
        fs::read(year_dir.join("2023-06-20").join("202306_0001.JPG")).unwrap(),
        b"june"
    );
    let catalog = read_catalog(&year_dir.join(CATALOG_FILENAME));
    assert!(catalog["index"].get("202305").is_none());
}

#[test]
fn test_out_of_order_files_follow_capture_key() {
    let ws = Workspace::new();
    // Written in the opposite order of their modification times.
    let files = [
        ("c.JPG", b"third".as_slice(), local(3, 9)),
        ("b.JPG", b"second".as_slice(), local(2, 9)),
        ("a.JPG", b"first".as_slice(), local(1, 9)),
    ];
    for (name, content, at) in &files {
        write_asset(&ws.roll.join(name), content, *at);
    }

    // Birth time leads where the filesystem records it, modification time
    // decides otherwise.
    let mut expected: Vec<_> = files
        .iter()
        .map(|(name, content, _)| {
            let metadata = fs::metadata(ws.roll.join(name)).unwrap();
            let modified = metadata.modified().unwrap();
            let created = metadata.created().unwrap_or(modified);
            (created, modified, content.to_vec())
        })
        .collect();
    expected.sort();

    Processor::new(ws.config("Roll"))
        .run(Command::ImportAssets)
        .unwrap();

    let year_dir = ws.year_dir("Roll");
    for (sequence, (_, _, content)) in expected.iter().enumerate() {
        let name = format!("202305_{:04}.JPG", sequence + 1);
        assert_eq!(&fs::read(year_dir.join(&name)).unwrap(), content, "{}", name);
    }
}

#[test]
fn test_identical_times_number_by_fingerprint() {
    let ws = Workspace::new();
    let names = ["x.JPG", "y.JPG", "z.JPG"];
    for (i, name) in names.iter().enumerate() {
        write_asset(&ws.roll.join(name), format!("frame {}", i).as_bytes(), local(4, 12));
    }

    let paths: Vec<PathBuf> = names.iter().map(|n| ws.roll.join(n)).collect();
    let pinned = CaptureTime::read(&paths[0]).unwrap();
    let inspect = |paths: &[PathBuf]| -> Vec<Asset> {
        paths
            .iter()
            .map(|p| Asset {
                captured: pinned,
                ..Asset::inspect(p, 1024).unwrap()
            })
            .collect()
    };

    let place = |project: &str, assets: Vec<Asset>| -> Vec<(String, String)> {
        let mut catalogs = CatalogRepository::new(
            CatalogStore::new(ws.work.join(project)),
            CorruptCatalogPolicy::Fail,
        );
        let survey = dedup::select_survivors(assets, &mut catalogs).unwrap();
        let mut placer = Placer::new(PlacementOptions {
            operation: FileOperation::Copy,
            ..Default::default()
        });
        placer
            .place_all(&survey.accepted, &mut catalogs)
            .unwrap()
            .into_iter()
            .map(|p| (p.fingerprint, p.file_name))
            .collect()
    };

    let forward = place("Forward", inspect(&paths));
    let reversed_paths: Vec<PathBuf> = paths.iter().rev().cloned().collect();
    let reversed = place("Reversed", inspect(&reversed_paths));

    assert_eq!(forward, reversed);
    let fingerprints: Vec<&String> = forward.iter().map(|(f, _)| f).collect();
    let mut sorted = fingerprints.clone();
    sorted.sort();
    assert_eq!(fingerprints, sorted);
    assert_eq!(
        forward.iter().map(|(_, n)| n.as_str()).collect::<Vec<_>>(),
        vec!["202305_0001.JPG", "202305_0002.JPG", "202305_0003.JPG"]
    );
}

#[test]
fn test_import_project_copies_missing_assets() {
    let ws = Workspace::new();
    write_asset(&ws.roll.join("shared.JPG"), b"shared", local(1, 9));
    let mut config = ws.config("Main");
    config.operation = FileOperation::Copy;
    Processor::new(config).run(Command::ImportAssets).unwrap();

    write_asset(&ws.roll.join("extra.JPG"), b"extra", local(5, 9));
    Processor::new(ws.config("Other"))
        .run(Command::ImportAssets)
        .unwrap();
    let other_dir = ws.year_dir("Other");
    assert_eq!(
        file_names(&other_dir),
        vec!["202305_0001.JPG", "202305_0002.JPG"]
    );

    let mut config = ws.config("Main");
    config.project_path = Some(ws.work.join("Other"));
    let mut processor = Processor::new(config);
    let results = processor.run(Command::ImportProject).unwrap();

    assert_eq!(processor.stats().already_present, 1);
    assert_eq!(processor.stats().placed, 1);
    assert!(
        results
            .iter()
            .any(|r| r.status == ProcessingStatus::AlreadyPresent)
    );

    let main_dir = ws.year_dir("Main");
    assert_eq!(
        file_names(&main_dir),
        vec!["202305_0001.JPG", "202305_0002.JPG"]
    );
    assert_eq!(fs::read(main_dir.join("202305_0002.JPG")).unwrap(), b"extra");
    assert_eq!(
        file_names(&other_dir),
        vec!["202305_0001.JPG", "202305_0002.JPG"]
    );
}

#[test]
fn test_rebuild_order_closes_gaps() {
    let ws = Workspace::new();
    write_asset(&ws.roll.join("a.JPG"), b"one", local(1, 9));
    write_asset(&ws.roll.join("b.JPG"), b"two", local(2, 9));
    write_asset(&ws.roll.join("c.JPG"), b"three", local(3, 9));
    Processor::new(ws.config("Roll"))
        .run(Command::ImportAssets)
        .unwrap();

    let year_dir = ws.year_dir("Roll");
    fs::remove_file(year_dir.join("202305_0002.JPG")).unwrap();

    let mut config = ws.config("Roll");
    config.years = vec![2023];
    Processor::new(config).run(Command::RebuildOrder).unwrap();

    assert_eq!(
        file_names(&year_dir),
        vec!["202305_0001.JPG", "202305_0002.JPG"]
    );
    assert_eq!(fs::read(year_dir.join("202305_0002.JPG")).unwrap(), b"three");
    assert!(!ws.work.join("Roll").join("2023_temp").exists());

    let catalog = read_catalog(&year_dir.join(CATALOG_FILENAME));
    assert_eq!(catalog["index"]["202305"], 3);
    assert_eq!(catalog["hash"].as_object().unwrap().len(), 2);
}

#[test]
fn test_rebuild_refuses_dry_run() {
    let ws = Workspace::new();
    let mut config = ws.config("Roll");
    config.years = vec![2023];
    config.dry_run = true;

    assert!(matches!(
        Processor::new(config).run(Command::RebuildOrder),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_split_database() {
    let ws = Workspace::new();
    let project = ws.work.join("Legacy");
    fs::create_dir_all(project.join("2022")).unwrap();
    fs::create_dir_all(project.join("2023")).unwrap();
    fs::write(
        project.join(CATALOG_FILENAME),
        r#"{
            "index": {"202212": 2, "202305": 3},
            "hash": {
                "aa": "202212_0001.JPG",
                "bb": "202305_0001.JPG",
                "cc": "202305_0002.MOV"
            }
        }"#,
    )
    .unwrap();

    let config = Config {
        project_path: Some(project.clone()),
        ..Config::default()
    };
    let mut processor = Processor::new(config);
    processor.run(Command::SplitDatabase).unwrap();
    assert_eq!(processor.stats().catalogs_written, 2);

    let y2022 = read_catalog(&project.join("2022").join(CATALOG_FILENAME));
    assert_eq!(y2022["index"]["202212"], 2);
    assert_eq!(y2022["hash"]["aa"], "202212_0001.JPG");

    let y2023 = read_catalog(&project.join("2023").join(CATALOG_FILENAME));
    assert_eq!(y2023["hash"].as_object().unwrap().len(), 2);
    assert!(y2023["index"].get("202212").is_none());
}
