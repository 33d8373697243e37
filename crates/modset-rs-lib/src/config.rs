pub struct ModsetOptions {
	cache_dir: std::path::PathBuf,
	data_dir: std::path::PathBuf,
}

impl Default for ModsetOptions {
	fn default() -> Self {
		Self {
			cache_dir: {
				#[cfg(target_os = "windows")]
				let path = std::path::PathBuf::from(std::env::var("APPDATA").expect("APPDATA missing."));

				#[cfg(not(target_os = "windows"))]
				let path = if let Ok(e) = std::env::var("XDG_CACHE_HOME") {
					std::path::PathBuf::from(e)
				} else {
					std::path::PathBuf::from(std::env::var("HOME").expect("HOME environment variable not set.")).join(".cache")
				};

				let path = path.join("modset-rs").join("cache");
				std::fs::create_dir_all(&path).expect("failed to create cache directory.");
				path
			},
			data_dir: {
				#[cfg(target_os = "windows")]
				let path = std::path::PathBuf::from(std::env::var("APPDATA").expect("APPDATA missing."));

				#[cfg(not(target_os = "windows"))]
				let path = if let Ok(e) = std::env::var("XDG_DATA_HOME") {
					std::path::PathBuf::from(e)
				} else {
					std::path::PathBuf::from(std::env::var("HOME").expect("HOME environment variable not set.")).join(".local/share")
				};

				let path = path.join("modset-rs").join("data");
				std::fs::create_dir_all(&path).expect("failed to create data directory.");
				path
			},
		}
	}
}

impl ModsetOptions {
	pub fn cache_dir(&self) -> &std::path::PathBuf {
		&self.cache_dir
	}
	/// returns if the directory is valid or not.
	pub fn set_cache_dir(&mut self, cache_dir: std::path::PathBuf) -> bool {
		if cache_dir.is_dir() {
			self.cache_dir = cache_dir;
			true
		} else {
			false
		}
	}

	pub fn data_dir(&self) -> &std::path::PathBuf {
		&self.data_dir
	}
	/// returns if the directory is valid or not.
	pub fn set_data_dir(&mut self, data_dir: std::path::PathBuf) -> bool {
		if data_dir.is_dir() {
			self.data_dir = data_dir;
			true
		} else {
			false
		}
	}
}
