use proptest::prelude::*;

use dmarc_summary::{aggregate, Category, MessageRecord, PeriodKey, Verdict};

fn verdict(passed: bool) -> Verdict {
	if passed { Verdict::Pass } else { Verdict::Fail }
}

fn arb_messages() -> impl Strategy<Value = Vec<MessageRecord>> {
	prop::collection::vec((any::<bool>(), any::<bool>(), 1u64..10_000), 0..40).prop_map(|rows| {
		rows.into_iter()
			.enumerate()
			.map(|(i, (spf, dkim, count))| {
				MessageRecord::new(&format!("192.0.2.{}", i), "domain.ca", verdict(spf), verdict(dkim), count)
			})
			.collect()
	})
}

proptest! {
	#[test]
	fn category_totals_sum_to_the_message_total(messages in arb_messages()) {
		let result = aggregate(&messages, "domain.ca", &PeriodKey::ThirtyDays).unwrap();
		let expected: u64 = messages.iter().map(|m| m.count).sum();

		prop_assert_eq!(result.total_messages(), expected);
		prop_assert_eq!(result.category_totals.sum(), Some(expected));

		let rows: usize = Category::ALL.iter().map(|c| result.detail_tables.table(*c).len()).sum();
		prop_assert_eq!(rows, messages.len());
	}

	#[test]
	fn percentages_stay_between_zero_and_one_hundred(messages in arb_messages()) {
		let result = aggregate(&messages, "domain.ca", &PeriodKey::ThirtyDays).unwrap();
		let percentages = &result.category_percentages.category_percentages;

		let mut total = 0.0;
		for category in Category::ALL.iter() {
			let value = percentages.get(*category);
			prop_assert!(!value.is_nan());
			prop_assert!((0.0..=100.0).contains(&value), "{} = {}", category, value);
			total += value;
		}

		if messages.is_empty() {
			prop_assert_eq!(total, 0.0);
		} else {
			// four values each off by at most 0.05
			prop_assert!((total - 100.0).abs() <= 0.2 + 1e-9, "percentages add up to {}", total);
		}
	}

	#[test]
	fn aggregation_is_deterministic(messages in arb_messages(), month in 1u32..=12) {
		let period = PeriodKey::month_of(chrono::NaiveDate::from_ymd_opt(2021, month, 1).unwrap());

		let first = aggregate(&messages, "domain.ca", &period).unwrap();
		let second = aggregate(&messages, "domain.ca", &period).unwrap();
		prop_assert_eq!(first, second);
	}
}
