use crate::testutil::{fixture_line, write_trace};
use crate::{
    parse_line, CacheConfig, Field, PrefetchingCache, RecordParseError, TraceRecord, FIELD_COUNT,
    REGISTER_COUNT,
};
use proptest::prelude::*;

const FIXTURE_LINES: usize = 64;

fn record_strategy() -> impl Strategy<Value = TraceRecord> {
    (
        any::<u32>(),
        any::<u64>(),
        any::<u64>(),
        "[a-z0-9 ,#\\[\\]]{0,24}",
        prop::array::uniform31(any::<u64>()),
        any::<u64>(),
        any::<u64>(),
    )
        .prop_map(
            |(step, address, offset, instruction, registers, sp, pc)| TraceRecord {
                step,
                address,
                offset,
                instruction,
                registers,
                sp,
                pc,
            },
        )
}

/// Index of a numeric field paired with the field it should be reported as.
fn numeric_field_strategy() -> impl Strategy<Value = (usize, Field)> {
    (0..FIELD_COUNT)
        .prop_filter("instruction field is free text", |idx| *idx != 3)
        .prop_map(|idx| {
            let field = match idx {
                0 => Field::Step,
                1 => Field::Address,
                2 => Field::Offset,
                35 => Field::StackPointer,
                36 => Field::ProgramCounter,
                n => Field::Register((n - 4) as u8),
            };
            (idx, field)
        })
}

fn format_u64(value: u64, hex: bool) -> String {
    if hex {
        format!("{value:#x}")
    } else {
        value.to_string()
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_formatted_record_parses_back(record in record_strategy()) {
        let parsed = parse_line(&record.to_line()).unwrap();
        prop_assert_eq!(parsed, record);
    }

    #[test]
    fn prop_mixed_bases_decode(
        values in prop::collection::vec(any::<u64>(), REGISTER_COUNT + 4),
        hex in prop::collection::vec(any::<bool>(), REGISTER_COUNT + 4),
        step in any::<u32>(),
    ) {
        let mut fields = vec![format!("{step:X}")];
        fields.push(format_u64(values[0], hex[0]));
        fields.push(format_u64(values[1], hex[1]));
        fields.push("\"mov x1, x2\"".to_string());
        for (value, hex) in values.iter().zip(&hex).skip(2) {
            fields.push(format_u64(*value, *hex));
        }
        let record = parse_line(&fields.join("|")).unwrap();

        prop_assert_eq!(record.step, step);
        prop_assert_eq!(record.address, values[0]);
        prop_assert_eq!(record.offset, values[1]);
        prop_assert_eq!(&record.registers[..], &values[2..2 + REGISTER_COUNT]);
        prop_assert_eq!(record.sp, values[2 + REGISTER_COUNT]);
        prop_assert_eq!(record.pc, values[3 + REGISTER_COUNT]);
    }

    #[test]
    fn prop_wrong_field_count_is_reported(count in (1usize..80).prop_filter("valid count", |c| *c != FIELD_COUNT)) {
        let line = vec!["0"; count].join("|");
        prop_assert_eq!(parse_line(&line), Err(RecordParseError::FieldCount { found: count }));
    }

    #[test]
    fn prop_bad_numeric_field_is_named(
        (idx, expected) in numeric_field_strategy(),
        garbage in "[g-wyz!@$%]{1,6}",
    ) {
        let mut fields: Vec<String> = fixture_line(1).split('|').map(str::to_string).collect();
        fields[idx] = garbage;
        match parse_line(&fields.join("|")) {
            Err(RecordParseError::Field { field, .. }) => prop_assert_eq!(field, expected),
            other => prop_assert!(false, "unexpected result {:?}", other),
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 24,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_cache_size_is_bounded(
        capacity in 1usize..16,
        prefetch_window in 0usize..24,
        queue_depth in 1usize..4,
        accesses in prop::collection::vec(0usize..FIXTURE_LINES + 8, 1..64),
    ) {
        let (_dir, path) = write_trace((0..FIXTURE_LINES).map(fixture_line));
        let config = CacheConfig { capacity, prefetch_window, queue_depth };
        let mut cache = PrefetchingCache::open(&path, config).unwrap();

        for line in accesses {
            let record = cache.get_line(line);
            if line < FIXTURE_LINES {
                prop_assert_eq!(record.map(|r| r.step), Some(line as u32));
            } else {
                prop_assert!(record.is_none());
            }
            prop_assert!(cache.len() <= capacity);
        }

        cache.close();
        prop_assert!(cache.len() <= capacity);
    }
}
