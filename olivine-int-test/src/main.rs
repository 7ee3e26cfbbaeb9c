use olivine::errors::OlivineResult;
use olivine::filter::field;
use olivine::find_options::FindOptions;
use olivine::keys::PrimaryKey;
use olivine_int_test::test_util::{cleanup, create_test_context, Specimen};

fn main() -> OlivineResult<()> {
    println!("Starting stress test...");
    let ctx = create_test_context()?;
    let db = ctx.db();

    let count = 100_000i64;
    let start = std::time::Instant::now();
    for i in 0..count {
        let specimen = Specimen {
            serial: i + 1,
            mineral: uuid::Uuid::new_v4().to_string(),
            locality: uuid::Uuid::new_v4().to_string(),
            grade: (i % 10) as f64,
            notes: None,
        };
        db.insert(&specimen)?;
    }
    println!("Inserted {} records in {:?}", count, start.elapsed());

    let start = std::time::Instant::now();
    let matched = db.count::<Specimen>(&field("grade").gte(5.0f64), &FindOptions::new())?;
    println!("Counted {} high-grade records in {:?}", matched, start.elapsed());

    let start = std::time::Instant::now();
    for serial in 1..=count {
        db.modify::<Specimen, _>(&PrimaryKey::I64(serial), |mut specimen| {
            specimen.grade += 1.0;
            Ok(specimen)
        })?;
    }
    println!("Modified {} records in {:?}", count, start.elapsed());

    let start = std::time::Instant::now();
    let total = db.count_all::<Specimen>(&FindOptions::new())?;
    println!("Counted {} records in {:?}", total, start.elapsed());

    cleanup(ctx)
}
