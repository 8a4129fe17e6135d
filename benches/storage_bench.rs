//! End-to-end statement benchmarks through `Database::submit`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pagedb::{DBConfig, Database};
use tempfile::TempDir;

fn populated(rows: usize, indexed: bool) -> (TempDir, Database) {
    let dir = TempDir::new().unwrap();
    let db = Database::open_with_config(DBConfig::for_testing(dir.path())).unwrap();
    db.submit("CREATE People(Id:int, Name:string, Born:date)").unwrap();

    for chunk in (0..rows).collect::<Vec<_>>().chunks(100) {
        let tuples: Vec<String> = chunk
            .iter()
            .map(|i| format!("({}, name{}, {:02}-{:02}-{})", i, i, i % 28 + 1, i % 12 + 1, 1950 + i % 70))
            .collect();
        db.submit(&format!("INSERT INTO People(Id, Name, Born) VALUES {}", tuples.join(", ")))
            .unwrap();
    }
    if indexed {
        db.submit("CREATEINDEX people_id ON People(Id)").unwrap();
    }
    (dir, db)
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    group.throughput(Throughput::Elements(100));
    group.bench_function("batch_100", |b| {
        b.iter_with_setup(
            || populated(0, false),
            |(dir, db)| {
                let tuples: Vec<String> = (0..100).map(|i| format!("({}, n{}, 01-01-2000)", i, i)).collect();
                db.submit(&format!("INSERT INTO People(Id, Name, Born) VALUES {}", tuples.join(", ")))
                    .unwrap();
                (dir, db)
            },
        );
    });
    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select");

    for rows in [1_000usize, 5_000] {
        let (_scan_dir, scan_db) = populated(rows, false);
        let (_index_dir, index_db) = populated(rows, true);
        let point = format!("SELECT Name FROM People WHERE Id = {}", rows / 2);

        group.bench_with_input(BenchmarkId::new("point_scan", rows), &rows, |b, _| {
            b.iter(|| black_box(scan_db.submit(&point).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("point_index", rows), &rows, |b, _| {
            b.iter(|| black_box(index_db.submit(&point).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("range_order_by_date", rows), &rows, |b, _| {
            b.iter(|| {
                black_box(
                    scan_db
                        .submit("SELECT Id FROM People WHERE Id > 10 AND NOT (Id > 500) ORDERBY Born")
                        .unwrap(),
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_select);
criterion_main!(benches);
