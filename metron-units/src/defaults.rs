//! Built-in definitions (about 100 units by category) and contexts

use crate::context::ContextDefinition;

/// Speed of light in vacuum, m/s
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
/// Planck constant, J*s
pub const PLANCK_CONSTANT: f64 = 6.626_070_15e-34;
/// Boltzmann constant, J/K
pub const BOLTZMANN_CONSTANT: f64 = 1.380_649e-23;

/// Default definition source: prefixes, SI base units, derived dimensions,
/// then derived units grouped by category
pub const DEFAULT_DEFINITIONS: &str = r#"
# ---- Decimal prefixes ----
yocto- = 1e-24 = y-
zepto- = 1e-21 = z-
atto- = 1e-18 = a-
femto- = 1e-15 = f-
pico- = 1e-12 = p-
nano- = 1e-9 = n-
micro- = 1e-6 = u- = µ- = μ-
milli- = 1e-3 = m-
centi- = 1e-2 = c-
deci- = 1e-1 = d-
deca- = 1e1 = da- = deka-
hecto- = 1e2 = h-
kilo- = 1e3 = k-
mega- = 1e6 = M-
giga- = 1e9 = G-
tera- = 1e12 = T-
peta- = 1e15 = P-
exa- = 1e18 = E-
zetta- = 1e21 = Z-
yotta- = 1e24 = Y-

# ---- Binary prefixes ----
kibi- = 2 ** 10 = Ki-
mebi- = 2 ** 20 = Mi-
gibi- = 2 ** 30 = Gi-
tebi- = 2 ** 40 = Ti-
pebi- = 2 ** 50 = Pi-
exbi- = 2 ** 60 = Ei-

# ---- Base units ----
meter = [length] = m = metre
second = [time] = s = sec
kilogram = [mass] = kg
ampere = [current] = A = amp
kelvin = [temperature] = K
mole = [substance] = mol
candela = [luminosity] = cd
bit = [information]

# ---- Derived dimensions ----
[area] = [length] ** 2
[volume] = [length] ** 3
[frequency] = 1 / [time]
[velocity] = [length] / [time]
[acceleration] = [velocity] / [time]
[force] = [mass] * [acceleration]
[energy] = [force] * [length]
[power] = [energy] / [time]
[pressure] = [force] / [area]
[charge] = [current] * [time]
[electric_potential] = [energy] / [charge]
[resistance] = [electric_potential] / [current]

# ---- Dimensionless ----
radian = 1 = rad
pi = 3.1415926535897932 = _ = π
percent = 0.01
ppm = 1e-6
dozen = 12
degree = pi / 180 * radian = deg
arcminute = degree / 60 = arcmin
arcsecond = arcminute / 60 = arcsec
revolution = 2 * pi * radian = rev = turn
steradian = radian ** 2 = sr

# ---- Time ----
minute = 60 * second = min
hour = 60 * minute = h = hr
day = 24 * hour = d
week = 7 * day = _ = wk
fortnight = 2 * week
year = 365.25 * day = yr = julian_year

# ---- Length ----
angstrom = 1e-10 * meter = Å
micron = micrometer
inch = 2.54 * centimeter = in = inches
foot = 12 * inch = ft = feet
yard = 3 * foot = yd
mile = 5280 * foot = mi
nautical_mile = 1852 * meter = nmi
astronomical_unit = 149597870700 * meter = au
parsec = 3.0856775814913673e16 * meter = pc

# ---- Mass ----
gram = 1e-3 * kilogram = g
tonne = 1e3 * kilogram = t = metric_ton
pound = 0.45359237 * kilogram = lb
ounce = pound / 16 = oz
stone = 14 * pound = st
grain = pound / 7000 = gr
carat = 200 * milligram = ct
dalton = 1.66053906660e-27 * kilogram = Da

# ---- Area ----
hectare = 10000 * meter ** 2 = ha
acre = 4046.8564224 * meter ** 2

# ---- Volume ----
liter = decimeter ** 3 = l = L = litre
gallon = 3.785411784 * liter = gal
quart = gallon / 4 = qt
pint = quart / 2 = pt
cup = pint / 2
fluid_ounce = pint / 16 = floz
tablespoon = fluid_ounce / 2 = tbsp
teaspoon = tablespoon / 3 = tsp

# ---- Frequency ----
hertz = 1 / second = Hz
revolutions_per_minute = revolution / minute = rpm

# ---- Velocity and acceleration ----
speed_of_light = 299792458 * meter / second = c
knot = nautical_mile / hour = kt
mile_per_hour = mile / hour = mph
kilometer_per_hour = kilometer / hour = kph
standard_gravity = 9.80665 * meter / second ** 2 = g_0 = g_n
light_year = speed_of_light * year = ly = lightyear

# ---- Force ----
newton = kilogram * meter / second ** 2 = N
dyne = gram * centimeter / second ** 2 = dyn
kilogram_force = standard_gravity * kilogram = kgf
pound_force = standard_gravity * pound = lbf

# ---- Energy ----
joule = newton * meter = J
erg = dyne * centimeter
calorie = 4.184 * joule = cal
electron_volt = 1.602176634e-19 * joule = eV
british_thermal_unit = 1055.05585262 * joule = Btu = BTU

# ---- Power ----
watt = joule / second = W
watt_hour = watt * hour = Wh
horsepower = 745.69987158227022 * watt = hp

# ---- Pressure ----
pascal = newton / meter ** 2 = Pa
bar = 1e5 * pascal
atmosphere = 101325 * pascal = atm
torr = atmosphere / 760 = Torr
psi = pound_force / inch ** 2
millimeter_Hg = 133.322387415 * pascal = mmHg

# ---- Electromagnetic ----
coulomb = ampere * second = C
volt = joule / coulomb = V
ohm = volt / ampere = Ω
siemens = 1 / ohm = S
farad = coulomb / volt = F
weber = volt * second = Wb
henry = weber / ampere = H
tesla = weber / meter ** 2 = T
gauss = 1e-4 * tesla

# ---- Photometry ----
lumen = candela * steradian = lm
lux = lumen / meter ** 2 = lx

# ---- Information ----
byte = 8 * bit = B = octet

# ---- Physical constants ----
planck_constant = 6.62607015e-34 * joule * second
boltzmann_constant = 1.380649e-23 * joule / kelvin
avogadro_constant = 6.02214076e23 / mole = N_A
elementary_charge = 1.602176634e-19 * coulomb
gravitational_constant = 6.67430e-11 * meter ** 3 / kilogram / second ** 2
"#;

/// Contexts registered by `UnitRegistry::with_defaults`
pub fn default_contexts() -> Vec<ContextDefinition> {
    vec![spectroscopy(), boltzmann()]
}

/// Wavelength, wavenumber, frequency and photon energy. `n` is the
/// refractive index of the medium. A conversion uses a single rule, so
/// every pair of the four gets its own. Wavenumber is taken as 1 / wavelength
/// in the medium, so that pair does not depend on `n`.
fn spectroscopy() -> ContextDefinition {
    let hc = PLANCK_CONSTANT * SPEED_OF_LIGHT;
    ContextDefinition::new("spectroscopy")
        .with_alias("sp")
        .with_default("n", 1.0)
        .with_transform(
            "meter",
            "hertz",
            |wavelength, p| Ok(SPEED_OF_LIGHT / (p.param("n")? * wavelength)),
            |frequency, p| Ok(SPEED_OF_LIGHT / (p.param("n")? * frequency)),
        )
        .with_transform(
            "1 / meter",
            "hertz",
            |wavenumber, p| Ok(wavenumber * SPEED_OF_LIGHT / p.param("n")?),
            |frequency, p| Ok(frequency * p.param("n")? / SPEED_OF_LIGHT),
        )
        .with_transform(
            "hertz",
            "joule",
            |frequency, _| Ok(PLANCK_CONSTANT * frequency),
            |energy, _| Ok(energy / PLANCK_CONSTANT),
        )
        .with_transform(
            "meter",
            "joule",
            move |wavelength, p| Ok(hc / (p.param("n")? * wavelength)),
            move |energy, p| Ok(hc / (p.param("n")? * energy)),
        )
        .with_transform(
            "1 / meter",
            "joule",
            move |wavenumber, p| Ok(hc * wavenumber / p.param("n")?),
            move |energy, p| Ok(energy * p.param("n")? / hc),
        )
        .with_transform(
            "1 / meter",
            "meter",
            |wavenumber, _| Ok(1.0 / wavenumber),
            |wavelength, _| Ok(1.0 / wavelength),
        )
}

/// Temperature as thermal energy, E = k * T
fn boltzmann() -> ContextDefinition {
    ContextDefinition::new("boltzmann").with_transform(
        "kelvin",
        "joule",
        |temperature, _| Ok(BOLTZMANN_CONSTANT * temperature),
        |energy, _| Ok(energy / BOLTZMANN_CONSTANT),
    )
}
